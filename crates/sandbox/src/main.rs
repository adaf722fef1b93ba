//! Casement Sandbox
//!
//! Scriptable host that drives a casement window session against the
//! headless backend.
//!
//! Responsibilities:
//! - Load the TOML config and the persisted window settings snapshot
//! - Build the virtual display table
//! - Run the session script through the controller, ticking after each action
//! - Snapshot the window settings back to disk on exit

mod config;

use anyhow::{Context, Result};
use casement_core_state::{ModeRequest, Point, Size, WindowConfig, WindowMode, WindowState};
use casement_platform::{HeadlessDisplay, HeadlessPlatform, PlatformWindow};
use casement_shell::WindowController;
use clap::Parser;
use config::Config;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "casement-sandbox")]
#[command(author, version, about = "Scriptable sandbox host for the casement window shell")]
struct Cli {
    /// Path to the TOML config file (defaults to the standard locations).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the window settings snapshot (defaults to the platform data
    /// directory).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Session script, overriding the config.
    #[arg(short, long)]
    script: Option<String>,

    /// Ticks to run after the script completes, overriding the config.
    #[arg(short, long)]
    ticks: Option<u32>,

    /// Log level, overriding the config (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for log level)
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load().unwrap_or_else(|e| {
            // Can't use tracing yet, fall back to eprintln
            eprintln!("Failed to load configuration: {}. Using defaults.", e);
            Config::default()
        }),
    };

    // Initialize logging with configured log level
    let requested_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    let log_level = parse_log_level(&requested_level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.unwrap_or(Level::INFO))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    if log_level.is_none() {
        warn!("Unknown log level {:?}, using info", requested_level);
    }

    // Validate and clamp config values
    let config_warnings = config.validate();
    for w in &config_warnings {
        warn!("Config: {}", w);
    }

    info!("Casement sandbox starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Restore the window settings snapshot (the source of truth across
    // sessions); fall back to the configured first-run defaults.
    let settings_path = settings_file_path(cli.settings.as_deref());
    let mut window_config = match load_window_config(&settings_path) {
        Some(saved) => {
            info!("Restored window settings from {}", settings_path.display());
            saved
        }
        None => {
            info!("No saved window settings, using configured defaults");
            config.window.clone()
        }
    };

    // Build the virtual display table
    let platform = build_platform(&config);
    match platform.displays() {
        Ok(displays) => {
            info!("Running {} virtual display(s):", displays.len());
            for d in &displays {
                info!(
                    "  Display {}: {}x{} at {},{} with {} mode(s) \"{}\"",
                    d.index,
                    d.bounds.width,
                    d.bounds.height,
                    d.bounds.x,
                    d.bounds.y,
                    d.modes.len(),
                    d.name
                );
            }
        }
        Err(e) => warn!("Failed to enumerate displays: {}", e),
    }

    let display_count = platform
        .display_count()
        .context("display enumeration failed")?;
    for note in window_config.sanitize(display_count) {
        warn!("Window settings: {}", note);
    }

    let mut controller =
        WindowController::new(Box::new(platform), &window_config, &config.session.title)
            .context("window creation failed")?;
    controller.on_event(|event| info!("Window event: {:?}", event));

    // Run the session
    let script = cli.script.unwrap_or_else(|| config.session.script.clone());
    let ticks = cli.ticks.unwrap_or(config.session.ticks);
    run_script(&mut controller, &script);
    for _ in 0..ticks {
        if let Err(e) = controller.tick() {
            warn!("Tick failed: {}", e);
        }
    }

    info!(
        "Final window state: {:?} at {:?} size {:?}",
        controller.state(),
        controller.position(),
        controller.size()
    );

    // Snapshot the settings back to disk
    let snapshot = controller.settings().snapshot();
    if let Err(e) = save_window_config(&settings_path, &snapshot) {
        warn!("Failed to save window settings: {}", e);
    }
    if let Err(e) = controller.shutdown() {
        warn!("Failed to destroy the window: {}", e);
    }

    info!("Casement sandbox finished");
    Ok(())
}

/// Map a config log-level string onto a tracing level.
fn parse_log_level(text: &str) -> Option<Level> {
    match text.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Build the headless backend from the configured display table.
fn build_platform(config: &Config) -> HeadlessPlatform {
    if config.displays.is_empty() {
        return HeadlessPlatform::new();
    }
    let displays = config
        .displays
        .iter()
        .map(|d| HeadlessDisplay::new(d.name.clone(), d.bounds(), &d.mode_rows()))
        .collect();
    HeadlessPlatform::with_displays(displays)
}

/// Resolve the window settings snapshot path.
fn settings_file_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => ProjectDirs::from("", "", "casement")
            .map(|dirs| dirs.data_dir().join("window-settings.json"))
            .unwrap_or_else(|| PathBuf::from("window-settings.json")),
    }
}

/// Load the persisted window settings, if any.
fn load_window_config(path: &Path) -> Option<WindowConfig> {
    let json = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&json) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse saved window settings: {}", e);
            None
        }
    }
}

/// Save the window settings snapshot as pretty-printed JSON.
fn save_window_config(path: &Path, config: &WindowConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Window settings saved to {}", path.display());
    Ok(())
}

/// Split a script into action tokens.
///
/// Whitespace separates actions and a trailing comma on a token is dropped,
/// so `move:100,200` keeps its internal comma.
fn script_actions(script: &str) -> Vec<&str> {
    script
        .split_whitespace()
        .map(|token| token.trim_end_matches(','))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Run the session script, ticking the controller after each action.
fn run_script(controller: &mut WindowController, script: &str) {
    for action in script_actions(script) {
        debug!("Script action: {}", action);
        let ticks = apply_action(controller, action);
        for _ in 0..ticks {
            if let Err(e) = controller.tick() {
                warn!("Tick failed: {}", e);
            }
        }
    }
}

/// Apply one script action, returning how many ticks should follow it.
///
/// Unknown or malformed actions log a warning and are skipped; a script
/// never aborts the session.
fn apply_action(controller: &mut WindowController, action: &str) -> u32 {
    match action {
        "windowed" => {
            controller.settings().mode.set(WindowMode::Windowed);
            1
        }
        "borderless" => {
            controller.settings().mode.set(WindowMode::Borderless);
            1
        }
        "fullscreen" => {
            controller.settings().mode.set(WindowMode::Fullscreen);
            1
        }
        "maximize" => {
            controller.request_state(WindowState::Maximized);
            1
        }
        "minimize" => {
            controller.request_state(WindowState::Minimized);
            1
        }
        "restore" => {
            controller.request_state(WindowState::Normal);
            1
        }
        "cycle" => {
            controller.cycle_mode();
            1
        }
        "tick" => 1,
        other => apply_parameterized_action(controller, other),
    }
}

/// Handle `tick:N`, `move:X,Y`, `resize:WxH` and `mode:WxH[@HZ]`.
fn apply_parameterized_action(controller: &mut WindowController, action: &str) -> u32 {
    if let Some(count) = action.strip_prefix("tick:") {
        return match count.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                warn!("Bad tick count {:?}", count);
                0
            }
        };
    }
    if let Some(coords) = action.strip_prefix("move:") {
        return match parse_point(coords) {
            Some(position) => {
                controller.proxy().schedule(move |platform| {
                    if let Err(e) = platform.set_position(position) {
                        warn!("Scripted move failed: {}", e);
                    }
                });
                1
            }
            None => {
                warn!("Bad move coordinates {:?}, expected X,Y", coords);
                0
            }
        };
    }
    if let Some(dims) = action.strip_prefix("resize:") {
        return match dims.parse::<ModeRequest>() {
            Ok(request) => {
                let size = Size::new(request.width, request.height);
                controller.proxy().schedule(move |platform| {
                    if let Err(e) = platform.set_size(size) {
                        warn!("Scripted resize failed: {}", e);
                    }
                });
                1
            }
            Err(e) => {
                warn!("Bad resize size {:?}: {}", dims, e);
                0
            }
        };
    }
    if let Some(mode) = action.strip_prefix("mode:") {
        return match mode.parse::<ModeRequest>() {
            Ok(request) => {
                let settings = controller.settings();
                settings.fullscreen_width.set(request.width);
                settings.fullscreen_height.set(request.height);
                settings.refresh_rate.set(request.refresh_rate.unwrap_or(0));
                0
            }
            Err(e) => {
                warn!("Bad mode request {:?}: {}", mode, e);
                0
            }
        };
    }
    warn!("Unknown script action {:?}", action);
    0
}

/// Parse `X,Y` into a point.
fn parse_point(text: &str) -> Option<Point> {
    let (x, y) = text.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_actions_tokenize() {
        let actions = script_actions("fullscreen, tick:2 move:100,200 windowed,");
        assert_eq!(actions, vec!["fullscreen", "tick:2", "move:100,200", "windowed"]);
    }

    #[test]
    fn test_script_actions_empty() {
        assert!(script_actions("").is_empty());
        assert!(script_actions("  ,  ").is_empty());
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("100,200"), Some(Point::new(100, 200)));
        assert_eq!(parse_point("-5, 10"), Some(Point::new(-5, 10)));
        assert_eq!(parse_point("100"), None);
        assert_eq!(parse_point("a,b"), None);
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_log_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn test_window_config_json_round_trip() {
        let mut config = WindowConfig::default();
        config.relative_x = 0.25;
        config.windowed_width = 1600;
        config.mode = WindowMode::Fullscreen;

        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: WindowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_run_script_resize_survives_state_changes() {
        let platform = HeadlessPlatform::new();
        let mut controller =
            WindowController::new(Box::new(platform), &WindowConfig::default(), "test").unwrap();

        run_script(&mut controller, "resize:1024x600 maximize restore tick");

        assert_eq!(controller.state(), WindowState::Normal);
        assert_eq!(controller.size(), Size::new(1024, 600));
        assert_eq!(controller.settings().snapshot().windowed_width, 1024);
    }

    #[test]
    fn test_run_script_fullscreen() {
        let platform = HeadlessPlatform::new();
        let mut controller =
            WindowController::new(Box::new(platform), &WindowConfig::default(), "test").unwrap();

        run_script(&mut controller, "fullscreen");

        assert_eq!(controller.state(), WindowState::Fullscreen);
        assert_eq!(controller.size(), Size::new(1920, 1080));
    }

    #[test]
    fn test_mode_action_retargets_fullscreen() {
        let platform = HeadlessPlatform::new();
        let mut controller =
            WindowController::new(Box::new(platform), &WindowConfig::default(), "test").unwrap();

        run_script(&mut controller, "mode:1600x900@60 fullscreen");

        assert_eq!(controller.size(), Size::new(1600, 900));
        let snapshot = controller.settings().snapshot();
        assert_eq!(snapshot.fullscreen_width, 1600);
        assert_eq!(snapshot.fullscreen_height, 900);
        assert_eq!(snapshot.refresh_rate, 60);
    }
}
