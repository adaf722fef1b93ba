//! Configuration for the casement sandbox.
//!
//! Configuration is loaded from TOML files in the following locations
//! (in order):
//! 1. the path passed with `--config`
//! 2. the platform config directory (`casement/casement.toml`)
//! 3. `./casement.toml` (current directory, for development)

use anyhow::{Context, Result};
use casement_core_state::{Rect, WindowConfig};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level for the tracing subscriber (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session behavior: script, tick count, window title.
    pub session: SessionConfig,

    /// First-run window geometry, used when no settings snapshot exists yet.
    pub window: WindowConfig,

    /// Virtual display table for the headless backend. Empty means the
    /// builtin single 1920x1080 display.
    #[serde(default)]
    pub displays: Vec<DisplayConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            session: SessionConfig::default(),
            window: WindowConfig::default(),
            displays: Vec::new(),
        }
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Window title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Script of actions to run, whitespace separated (trailing commas on
    /// actions are tolerated). Empty means no scripted actions.
    #[serde(default)]
    pub script: String,

    /// Number of ticks to run after the script completes.
    #[serde(default = "default_ticks")]
    pub ticks: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            script: String::new(),
            ticks: default_ticks(),
        }
    }
}

/// One virtual display row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display name reported by the backend.
    #[serde(default = "default_display_name")]
    pub name: String,

    /// Desktop-space origin of the display.
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,

    /// Bounds size in pixels.
    #[serde(default = "default_display_width")]
    pub width: i32,
    #[serde(default = "default_display_height")]
    pub height: i32,

    /// Mode table rows. An empty table makes the backend synthesize a
    /// bounds-sized 60 Hz desktop mode.
    #[serde(default)]
    pub modes: Vec<ModeConfig>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name: default_display_name(),
            x: 0,
            y: 0,
            width: default_display_width(),
            height: default_display_height(),
            modes: Vec::new(),
        }
    }
}

impl DisplayConfig {
    /// Bounds rectangle in desktop space.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Mode rows in the `(width, height, refresh)` form the backend takes.
    pub fn mode_rows(&self) -> Vec<(u32, u32, u32)> {
        self.modes
            .iter()
            .map(|m| (m.width, m.height, m.refresh))
            .collect()
    }
}

/// One display mode row. Width and height are required; refresh defaults
/// to 60 Hz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModeConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_mode_refresh")]
    pub refresh: u32,
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Tries the following locations in order:
    /// 1. platform config directory (`casement/casement.toml`)
    /// 2. `./casement.toml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp nonsense values in place, returning one warning per correction.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.session.ticks == 0 {
            warnings.push("session.ticks was 0, running 1 tick instead".to_string());
            self.session.ticks = 1;
        }

        for (index, display) in self.displays.iter_mut().enumerate() {
            if display.width <= 0 || display.height <= 0 {
                warnings.push(format!(
                    "displays[{}] has degenerate size {}x{}, using 1920x1080",
                    index, display.width, display.height
                ));
                display.width = default_display_width();
                display.height = default_display_height();
            }
        }

        warnings
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("com", "casement", "casement") {
        paths.push(proj_dirs.config_dir().join("casement.toml"));
    }

    paths.push(PathBuf::from("casement.toml"));

    paths
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_title() -> String {
    "Casement Sandbox".to_string()
}

fn default_ticks() -> u32 {
    4
}

fn default_display_name() -> String {
    "Headless-1".to_string()
}

fn default_display_width() -> i32 {
    1920
}

fn default_display_height() -> i32 {
    1080
}

fn default_mode_refresh() -> u32 {
    60
}
