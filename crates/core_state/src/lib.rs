//! Casement Core State Model
//!
//! Platform-agnostic data model for single-window lifecycle management.
//!
//! This crate defines the vocabulary shared by the platform layer and the
//! window shell:
//! - Geometry primitives (`Point`, `Size`, `Rect`)
//! - Window state and mode enums with their derivation/cycling rules
//! - Display and display-mode snapshots
//! - The persisted window configuration and its fractional-position math
//!
//! Everything here is pure data and pure functions; no OS calls, no threads.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Index of a display as reported by the platform (0 = primary).
pub type DisplayIndex = usize;

/// Errors produced when parsing a display-mode request from text.
#[derive(Debug, Error)]
pub enum ModeParseError {
    #[error("mode `{0}` is not of the form WIDTHxHEIGHT or WIDTHxHEIGHT@HZ")]
    Malformed(String),

    #[error("mode `{0}` has a zero width or height")]
    ZeroDimension(String),
}

/// A point in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A size in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check whether either dimension is zero.
    ///
    /// Some platforms report a zero-sized drawable while a window is
    /// minimized; callers treat such sizes as "no information".
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A rectangle in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Check if a point lies inside this rectangle.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// The origin of the rectangle.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// The extent of the rectangle as a `Size` (negative extents clamp to 0).
    pub fn size(&self) -> Size {
        Size::new(self.width.max(0) as u32, self.height.max(0) as u32)
    }
}

/// The actual condition of the native window.
///
/// Distinct from [`WindowMode`]: a mode is what the user selected, while
/// the state also captures `Maximized`/`Minimized`, which the OS can enter
/// on its own (title-bar double click, taskbar minimize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    /// Floating bordered window at a user-chosen position and size.
    Normal,
    /// Exclusive fullscreen with an explicit display mode.
    Fullscreen,
    /// Fullscreen at the desktop resolution without a mode change.
    BorderlessFullscreen,
    /// Maximized to the working area; the OS decides the final pixel size.
    Maximized,
    /// Minimized/iconified; geometry is meaningless while here.
    Minimized,
}

impl WindowState {
    /// Derive the window state from an OS flag snapshot.
    ///
    /// Precedence: minimized beats every fullscreen flag, desktop
    /// fullscreen beats exclusive fullscreen (platforms report both bits
    /// set for desktop fullscreen), fullscreen beats maximized.
    pub fn from_flags(flags: &WindowFlags) -> Self {
        if flags.minimized {
            WindowState::Minimized
        } else if flags.desktop_fullscreen {
            WindowState::BorderlessFullscreen
        } else if flags.fullscreen {
            WindowState::Fullscreen
        } else if flags.maximized {
            WindowState::Maximized
        } else {
            WindowState::Normal
        }
    }
}

/// User-selectable presentation mode, the cycling concept exposed to UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Bordered window on the desktop.
    #[default]
    Windowed,
    /// Borderless window covering the whole display at desktop resolution.
    Borderless,
    /// Exclusive fullscreen with a negotiated display mode.
    Fullscreen,
}

impl WindowMode {
    /// The successor in the fixed cycling order
    /// Windowed → Borderless → Fullscreen → Windowed.
    pub fn next(self) -> Self {
        match self {
            WindowMode::Windowed => WindowMode::Borderless,
            WindowMode::Borderless => WindowMode::Fullscreen,
            WindowMode::Fullscreen => WindowMode::Windowed,
        }
    }
}

/// Snapshot of the OS-reported window condition flags.
///
/// Queried from the platform each tick; [`WindowState::from_flags`] turns
/// it into a state value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFlags {
    /// An exclusive fullscreen mode is active.
    pub fullscreen: bool,
    /// Fullscreen at desktop resolution (implies `fullscreen` on most
    /// platforms).
    pub desktop_fullscreen: bool,
    /// The window is maximized.
    pub maximized: bool,
    /// The window is minimized/iconified.
    pub minimized: bool,
    /// The window has input focus.
    pub focused: bool,
    /// The window is visible (shown, not hidden).
    pub visible: bool,
    /// The window has a border/title bar.
    pub bordered: bool,
    /// The window can be resized by the user.
    pub resizable: bool,
}

/// Pixel format of a display mode's framebuffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit, 8 bits per channel, no alpha.
    #[default]
    Xrgb8888,
    /// 32-bit with alpha.
    Argb8888,
    /// 16-bit 5-6-5.
    Rgb565,
    /// Anything else, carried as the platform's raw format code.
    Other(u32),
}

/// A concrete display mode offered by a display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMode {
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Refresh rate in Hz (0 if the platform does not report one).
    pub refresh_rate: u32,
    /// Framebuffer pixel format.
    pub pixel_format: PixelFormat,
    /// The display this mode belongs to.
    pub display_index: DisplayIndex,
}

impl DisplayMode {
    /// The mode's resolution as a `Size`.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A request for a display mode, used for closest-mode queries.
///
/// `refresh_rate: None` is the wildcard: any refresh rate is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRequest {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: Option<u32>,
}

impl ModeRequest {
    /// Request a resolution with no refresh-rate constraint.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            refresh_rate: None,
        }
    }

    /// Request a resolution at a specific refresh rate.
    pub fn with_refresh(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            width,
            height,
            refresh_rate: Some(refresh_rate),
        }
    }
}

impl FromStr for ModeRequest {
    type Err = ModeParseError;

    /// Parse `"1920x1080"` or `"1920x1080@60"`.
    ///
    /// A refresh of `@0` is accepted and leaves the rate unconstrained,
    /// same as omitting it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (resolution, refresh) = match text.split_once('@') {
            Some((res, hz)) => (res, Some(hz)),
            None => (text, None),
        };

        let (w, h) = resolution
            .split_once('x')
            .ok_or_else(|| ModeParseError::Malformed(s.to_string()))?;

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| ModeParseError::Malformed(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| ModeParseError::Malformed(s.to_string()))?;

        if width == 0 || height == 0 {
            return Err(ModeParseError::ZeroDimension(s.to_string()));
        }

        let refresh_rate = match refresh {
            Some(hz) => {
                let hz: u32 = hz
                    .trim()
                    .parse()
                    .map_err(|_| ModeParseError::Malformed(s.to_string()))?;
                if hz == 0 {
                    None
                } else {
                    Some(hz)
                }
            }
            None => None,
        };

        Ok(Self {
            width,
            height,
            refresh_rate,
        })
    }
}

/// An immutable snapshot of one display.
///
/// Re-queried from the platform on demand and never cached beyond a
/// single lookup; display topology can change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Display {
    /// Display index (0 = primary).
    pub index: DisplayIndex,
    /// Human-readable display name.
    pub name: String,
    /// Bounds in the global desktop coordinate space.
    pub bounds: Rect,
    /// Modes offered by this display, in the platform's preference order.
    pub modes: Vec<DisplayMode>,
}

// ============================================================================
// Persisted window configuration
// ============================================================================

/// Persisted window geometry and mode, the source of truth across
/// process restarts.
///
/// Positions are stored as fractions of the available placement range on
/// the window's display, so the same file restores a sensible placement
/// after a resolution change. The available range on the x axis is
/// `display_width - window_width`; a fraction of 0.5 centers the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Fractional horizontal position in `[0, 1]`.
    #[serde(default = "default_relative")]
    pub relative_x: f64,

    /// Fractional vertical position in `[0, 1]`.
    #[serde(default = "default_relative")]
    pub relative_y: f64,

    /// Windowed-mode client width in pixels, always nonzero.
    #[serde(default = "default_windowed_width")]
    pub windowed_width: u32,

    /// Windowed-mode client height in pixels, always nonzero.
    #[serde(default = "default_windowed_height")]
    pub windowed_height: u32,

    /// Preferred exclusive-fullscreen width in pixels.
    #[serde(default = "default_fullscreen_width")]
    pub fullscreen_width: u32,

    /// Preferred exclusive-fullscreen height in pixels.
    #[serde(default = "default_fullscreen_height")]
    pub fullscreen_height: u32,

    /// Preferred fullscreen refresh rate in Hz (0 = let the platform pick).
    #[serde(default)]
    pub refresh_rate: u32,

    /// The display the window lives on.
    #[serde(default)]
    pub display_index: DisplayIndex,

    /// The user-selected window mode.
    #[serde(default)]
    pub mode: WindowMode,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            relative_x: default_relative(),
            relative_y: default_relative(),
            windowed_width: default_windowed_width(),
            windowed_height: default_windowed_height(),
            fullscreen_width: default_fullscreen_width(),
            fullscreen_height: default_fullscreen_height(),
            refresh_rate: 0,
            display_index: 0,
            mode: WindowMode::default(),
        }
    }
}

impl WindowConfig {
    /// Clamp every field back into its documented range.
    ///
    /// Returns a note for each correction so the caller can log them.
    /// `display_count` is the number of displays currently attached; an
    /// out-of-range display index falls back to the primary display.
    pub fn sanitize(&mut self, display_count: usize) -> Vec<String> {
        let mut notes = Vec::new();

        if !self.relative_x.is_finite() || !(0.0..=1.0).contains(&self.relative_x) {
            notes.push(format!(
                "relative_x {} out of range, reset to {}",
                self.relative_x,
                default_relative()
            ));
            self.relative_x = default_relative();
        }
        if !self.relative_y.is_finite() || !(0.0..=1.0).contains(&self.relative_y) {
            notes.push(format!(
                "relative_y {} out of range, reset to {}",
                self.relative_y,
                default_relative()
            ));
            self.relative_y = default_relative();
        }
        if self.windowed_width == 0 {
            notes.push(format!(
                "windowed_width 0 is invalid, reset to {}",
                default_windowed_width()
            ));
            self.windowed_width = default_windowed_width();
        }
        if self.windowed_height == 0 {
            notes.push(format!(
                "windowed_height 0 is invalid, reset to {}",
                default_windowed_height()
            ));
            self.windowed_height = default_windowed_height();
        }
        if self.fullscreen_width == 0 {
            notes.push(format!(
                "fullscreen_width 0 is invalid, reset to {}",
                default_fullscreen_width()
            ));
            self.fullscreen_width = default_fullscreen_width();
        }
        if self.fullscreen_height == 0 {
            notes.push(format!(
                "fullscreen_height 0 is invalid, reset to {}",
                default_fullscreen_height()
            ));
            self.fullscreen_height = default_fullscreen_height();
        }
        if display_count > 0 && self.display_index >= display_count {
            notes.push(format!(
                "display_index {} does not exist ({} displays), falling back to primary",
                self.display_index, display_count
            ));
            self.display_index = 0;
        }

        notes
    }

    /// The windowed-mode size as a `Size`.
    pub fn windowed_size(&self) -> Size {
        Size::new(self.windowed_width, self.windowed_height)
    }

    /// The fullscreen target as a closest-mode request
    /// (refresh 0 maps to the wildcard).
    pub fn fullscreen_request(&self) -> ModeRequest {
        ModeRequest {
            width: self.fullscreen_width,
            height: self.fullscreen_height,
            refresh_rate: if self.refresh_rate == 0 {
                None
            } else {
                Some(self.refresh_rate)
            },
        }
    }
}

// Default value functions for serde
fn default_relative() -> f64 {
    0.5
}

fn default_windowed_width() -> u32 {
    1280
}

fn default_windowed_height() -> u32 {
    720
}

fn default_fullscreen_width() -> u32 {
    1920
}

fn default_fullscreen_height() -> u32 {
    1080
}

// ============================================================================
// Fractional position math
// ============================================================================

/// Convert an absolute window position into a placement fraction.
///
/// The fraction is the window's offset from the display origin divided by
/// the available placement range (`display_len - window_len`). When the
/// window is at least as large as the display the range is degenerate and
/// the fraction is exactly `0` (never NaN or infinite). The result is
/// clamped to `[0, 1]` for windows dragged partially off the display.
pub fn position_to_fraction(
    window_pos: i32,
    window_len: i32,
    display_origin: i32,
    display_len: i32,
) -> f64 {
    let range = display_len - window_len;
    if range <= 0 {
        return 0.0;
    }
    let fraction = f64::from(window_pos - display_origin) / f64::from(range);
    fraction.clamp(0.0, 1.0)
}

/// Convert a placement fraction back into an absolute window position.
///
/// Inverse of [`position_to_fraction`] up to 1-pixel rounding.
pub fn fraction_to_position(
    fraction: f64,
    window_len: i32,
    display_origin: i32,
    display_len: i32,
) -> i32 {
    let range = (display_len - window_len).max(0);
    (f64::from(range) * fraction).round() as i32 + display_origin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges_and_contains() {
        let r = Rect::new(100, 100, 1920, 1080);
        assert_eq!(r.right(), 2020);
        assert_eq!(r.bottom(), 1180);
        assert!(r.contains(Point::new(100, 100)));
        assert!(r.contains(Point::new(2019, 1179)));
        assert!(!r.contains(Point::new(2020, 500)));
        assert!(!r.contains(Point::new(50, 500)));
        assert_eq!(r.size(), Size::new(1920, 1080));
    }

    #[test]
    fn test_size_is_empty() {
        assert!(Size::new(0, 600).is_empty());
        assert!(Size::new(800, 0).is_empty());
        assert!(!Size::new(800, 600).is_empty());
    }

    #[test]
    fn test_state_from_flags_precedence() {
        let mut flags = WindowFlags {
            fullscreen: true,
            desktop_fullscreen: true,
            maximized: true,
            minimized: true,
            ..Default::default()
        };
        // Minimized wins over everything
        assert_eq!(WindowState::from_flags(&flags), WindowState::Minimized);

        flags.minimized = false;
        assert_eq!(
            WindowState::from_flags(&flags),
            WindowState::BorderlessFullscreen
        );

        flags.desktop_fullscreen = false;
        assert_eq!(WindowState::from_flags(&flags), WindowState::Fullscreen);

        flags.fullscreen = false;
        assert_eq!(WindowState::from_flags(&flags), WindowState::Maximized);

        flags.maximized = false;
        assert_eq!(WindowState::from_flags(&flags), WindowState::Normal);
    }

    #[test]
    fn test_mode_next_cycles() {
        assert_eq!(WindowMode::Windowed.next(), WindowMode::Borderless);
        assert_eq!(WindowMode::Borderless.next(), WindowMode::Fullscreen);
        assert_eq!(WindowMode::Fullscreen.next(), WindowMode::Windowed);
        // Three steps return to the start
        let mode = WindowMode::Windowed;
        assert_eq!(mode.next().next().next(), mode);
    }

    #[test]
    fn test_mode_request_from_str() {
        let req: ModeRequest = "1920x1080@60".parse().unwrap();
        assert_eq!(req, ModeRequest::with_refresh(1920, 1080, 60));

        let req: ModeRequest = "2560x1440".parse().unwrap();
        assert_eq!(req, ModeRequest::new(2560, 1440));

        // Whitespace tolerated, @0 is the wildcard
        let req: ModeRequest = " 1280 x 720 @ 0 ".parse().unwrap();
        assert_eq!(req, ModeRequest::new(1280, 720));
    }

    #[test]
    fn test_mode_request_from_str_rejects_garbage() {
        assert!("1920".parse::<ModeRequest>().is_err());
        assert!("x1080".parse::<ModeRequest>().is_err());
        assert!("1920x1080@fast".parse::<ModeRequest>().is_err());
        assert!(matches!(
            "0x1080".parse::<ModeRequest>(),
            Err(ModeParseError::ZeroDimension(_))
        ));
    }

    #[test]
    fn test_fraction_degenerate_axis_is_zero() {
        // Window exactly as wide as the display: range is 0
        assert_eq!(position_to_fraction(0, 1920, 0, 1920), 0.0);
        // Window wider than the display: range is negative
        assert_eq!(position_to_fraction(-100, 2560, 0, 1920), 0.0);
    }

    #[test]
    fn test_fraction_read_centered() {
        // Display bounds (100,100,1920,1080), window 800x600, fraction 0.5
        // x: (1920-800)*0.5 = 560, +100 origin = 660
        // y: (1080-600)*0.5 = 240, +100 origin = 340
        assert_eq!(fraction_to_position(0.5, 800, 100, 1920), 660);
        assert_eq!(fraction_to_position(0.5, 600, 100, 1080), 340);
    }

    #[test]
    fn test_fraction_round_trip_within_one_pixel() {
        let display_origin = -1920; // display left of the primary
        let display_len = 1920;
        let window_len = 733;
        for pos in [-1920, -1800, -1400, -1187, -734] {
            let f = position_to_fraction(pos, window_len, display_origin, display_len);
            let back = fraction_to_position(f, window_len, display_origin, display_len);
            assert!(
                (back - pos).abs() <= 1,
                "{pos} round-tripped to {back} via fraction {f}"
            );
        }
    }

    #[test]
    fn test_fraction_clamps_offscreen_positions() {
        // Window dragged past the left edge clamps to 0
        assert_eq!(position_to_fraction(-500, 800, 0, 1920), 0.0);
        // Dragged past the right edge clamps to 1
        assert_eq!(position_to_fraction(5000, 800, 0, 1920), 1.0);
    }

    #[test]
    fn test_window_config_defaults() {
        let config = WindowConfig::default();
        assert_eq!(config.relative_x, 0.5);
        assert_eq!(config.relative_y, 0.5);
        assert_eq!(config.windowed_size(), Size::new(1280, 720));
        assert_eq!(config.mode, WindowMode::Windowed);
        assert_eq!(config.display_index, 0);
        // Refresh 0 maps to the wildcard request
        assert_eq!(config.fullscreen_request().refresh_rate, None);
    }

    #[test]
    fn test_window_config_sanitize() {
        let mut config = WindowConfig {
            relative_x: 1.7,
            relative_y: f64::NAN,
            windowed_width: 0,
            display_index: 9,
            ..Default::default()
        };
        let notes = config.sanitize(2);
        assert_eq!(notes.len(), 4);
        assert_eq!(config.relative_x, 0.5);
        assert_eq!(config.relative_y, 0.5);
        assert_eq!(config.windowed_width, default_windowed_width());
        assert_eq!(config.display_index, 0);

        // A clean config passes untouched
        let mut clean = WindowConfig::default();
        assert!(clean.sanitize(1).is_empty());
    }

    #[test]
    fn test_window_config_fullscreen_request() {
        let config = WindowConfig {
            fullscreen_width: 2560,
            fullscreen_height: 1440,
            refresh_rate: 144,
            ..Default::default()
        };
        assert_eq!(
            config.fullscreen_request(),
            ModeRequest::with_refresh(2560, 1440, 144)
        );
    }
}
