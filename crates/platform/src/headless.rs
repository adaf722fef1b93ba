//! In-memory window backend for the sandbox host and the test suite.
//!
//! The headless backend keeps the whole platform state (window geometry,
//! flags, virtual displays with fixed mode tables) in ordinary fields and
//! delivers the same raw event stream a real backend would, which makes
//! every shell behavior reproducible without a compositor.
//!
//! External changes a real OS would originate (the user dragging the
//! window, clicking maximize, the compositor taking focus away) are
//! simulated with the `user_*` methods. Fault knobs force the mode-query
//! paths to fail so degraded-platform behavior is testable.

use crate::{OwningThread, PlatformError, PlatformWindow, RawWindowEvent, WindowDescriptor};
use casement_core_state::{
    DisplayIndex, DisplayMode, ModeRequest, PixelFormat, Point, Rect, Size, WindowFlags,
    WindowMode,
};
use std::collections::VecDeque;

/// Vertical inset of the simulated taskbar.
///
/// Maximized windows get the display bounds minus this strip, so the
/// maximized size is observably different from the borderless-fullscreen
/// size.
const WORK_AREA_INSET: i32 = 40;

/// One virtual display: a name, desktop bounds, and a fixed mode table.
#[derive(Debug, Clone)]
pub struct HeadlessDisplay {
    /// Human-readable name.
    pub name: String,
    /// Bounds in desktop coordinates.
    pub bounds: Rect,
    /// Modes offered by this display.
    pub modes: Vec<DisplayMode>,
    /// The desktop mode (what the display currently runs at).
    pub desktop_mode: DisplayMode,
}

impl HeadlessDisplay {
    /// Create a display from `(width, height, refresh)` mode rows.
    ///
    /// The desktop mode is the table entry matching the bounds size with
    /// the highest refresh rate; if the table has no such entry a
    /// bounds-sized 60 Hz mode is synthesized.
    pub fn new(name: impl Into<String>, bounds: Rect, mode_rows: &[(u32, u32, u32)]) -> Self {
        let modes: Vec<DisplayMode> = mode_rows
            .iter()
            .map(|&(width, height, refresh_rate)| DisplayMode {
                width,
                height,
                refresh_rate,
                pixel_format: PixelFormat::default(),
                display_index: 0,
            })
            .collect();

        let native = bounds.size();
        let desktop_mode = modes
            .iter()
            .filter(|m| m.width == native.width && m.height == native.height)
            .max_by_key(|m| m.refresh_rate)
            .copied()
            .unwrap_or(DisplayMode {
                width: native.width,
                height: native.height,
                refresh_rate: 60,
                pixel_format: PixelFormat::default(),
                display_index: 0,
            });

        Self {
            name: name.into(),
            bounds,
            modes,
            desktop_mode,
        }
    }
}

/// Deterministic in-memory implementation of [`PlatformWindow`].
///
/// Drawable and client size are equal (scale factor 1.0). While the
/// window is minimized the drawable size is reported as zero, matching
/// platforms that drop the backbuffer of iconified windows, while the
/// client size keeps its last value. Restore brings back the geometry
/// from before minimize/maximize; real platforms may restore differently.
pub struct HeadlessPlatform {
    owner: OwningThread,
    displays: Vec<HeadlessDisplay>,
    events: VecDeque<RawWindowEvent>,
    supported_modes: Vec<WindowMode>,

    created: bool,
    title: String,
    /// Bordered-windowed geometry, the restore target.
    position: Point,
    size: Size,

    fullscreen_mode: Option<DisplayMode>,
    desktop_fullscreen: bool,
    maximized: bool,
    minimized: bool,
    focused: bool,
    visible: bool,
    bordered: bool,
    resizable: bool,

    fail_closest_mode_queries: bool,
    fail_display_mode_queries: bool,
}

impl HeadlessPlatform {
    /// One 1920×1080 display at the desktop origin with a small 60 Hz
    /// mode table.
    pub fn new() -> Self {
        Self::with_displays(vec![HeadlessDisplay::new(
            "Headless-1",
            Rect::new(0, 0, 1920, 1080),
            &[
                (1920, 1080, 60),
                (1600, 900, 60),
                (1280, 720, 60),
                (1024, 768, 60),
                (800, 600, 60),
            ],
        )])
    }

    /// Build a backend with an explicit display table.
    ///
    /// An empty table is replaced by the default single display so a
    /// window always has somewhere to live.
    pub fn with_displays(mut displays: Vec<HeadlessDisplay>) -> Self {
        if displays.is_empty() {
            tracing::warn!("no virtual displays configured, falling back to a single 1920x1080");
            return Self::new();
        }

        // Patch each mode with the display it belongs to.
        for (index, display) in displays.iter_mut().enumerate() {
            for mode in &mut display.modes {
                mode.display_index = index;
            }
            display.desktop_mode.display_index = index;
        }

        Self {
            owner: OwningThread::capture(),
            displays,
            events: VecDeque::new(),
            supported_modes: vec![
                WindowMode::Windowed,
                WindowMode::Borderless,
                WindowMode::Fullscreen,
            ],
            created: false,
            title: String::new(),
            position: Point::new(0, 0),
            size: Size::new(0, 0),
            fullscreen_mode: None,
            desktop_fullscreen: false,
            maximized: false,
            minimized: false,
            focused: false,
            visible: false,
            bordered: true,
            resizable: true,
            fail_closest_mode_queries: false,
            fail_display_mode_queries: false,
        }
    }

    /// Restrict which window modes this backend claims to support.
    pub fn set_supported_modes(&mut self, modes: Vec<WindowMode>) {
        self.supported_modes = modes;
    }

    /// Make every closest-mode query fail.
    pub fn set_fail_closest_mode_queries(&mut self, fail: bool) {
        self.fail_closest_mode_queries = fail;
    }

    /// Make current-mode and window-mode queries fail.
    pub fn set_fail_display_mode_queries(&mut self, fail: bool) {
        self.fail_display_mode_queries = fail;
    }

    /// Queue a raw event verbatim, bypassing the simulation methods.
    ///
    /// Lets tests deliver stale or out-of-order payloads.
    pub fn inject_event(&mut self, event: RawWindowEvent) {
        self.events.push_back(event);
    }

    // ------------------------------------------------------------------
    // Simulated user/compositor actions
    // ------------------------------------------------------------------

    /// The user drags the window to `position`.
    pub fn user_move(&mut self, position: Point) {
        self.position = position;
        self.events.push_back(RawWindowEvent::Moved(position));
    }

    /// The user resizes the window to `size`.
    pub fn user_resize(&mut self, size: Size) {
        self.size = size;
        self.events.push_back(RawWindowEvent::Resized(size));
    }

    /// The user maximizes the window (title-bar double click).
    pub fn user_maximize(&mut self) {
        self.minimized = false;
        self.maximized = true;
        self.events
            .push_back(RawWindowEvent::Resized(self.effective_size()));
    }

    /// The user minimizes the window.
    pub fn user_minimize(&mut self) {
        self.minimized = true;
        self.events.push_back(RawWindowEvent::Minimized);
    }

    /// The user restores the window from minimized/maximized.
    pub fn user_restore(&mut self) {
        self.minimized = false;
        self.maximized = false;
        self.events.push_back(RawWindowEvent::Restored);
        self.events.push_back(RawWindowEvent::Resized(self.size));
    }

    /// Focus moves to or away from the window.
    pub fn user_focus(&mut self, focused: bool) {
        self.focused = focused;
        self.events.push_back(if focused {
            RawWindowEvent::FocusGained
        } else {
            RawWindowEvent::FocusLost
        });
    }

    /// The pointer crosses the window boundary.
    pub fn user_mouse_crossing(&mut self, entered: bool) {
        self.events.push_back(if entered {
            RawWindowEvent::MouseEntered
        } else {
            RawWindowEvent::MouseLeft
        });
    }

    /// The user asks to close the window.
    pub fn user_request_close(&mut self) {
        self.events.push_back(RawWindowEvent::CloseRequested);
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn require_window(&self) -> Result<(), PlatformError> {
        if self.created {
            Ok(())
        } else {
            Err(PlatformError::WindowNotCreated)
        }
    }

    fn display_at(&self, index: DisplayIndex) -> Result<&HeadlessDisplay, PlatformError> {
        self.displays
            .get(index)
            .ok_or(PlatformError::InvalidDisplayIndex(index, self.displays.len()))
    }

    fn work_area(&self, index: DisplayIndex) -> Rect {
        let bounds = self.displays[index].bounds;
        Rect::new(
            bounds.x,
            bounds.y,
            bounds.width,
            (bounds.height - WORK_AREA_INSET).max(1),
        )
    }

    /// Index of the display containing the window center.
    fn display_under_window(&self) -> DisplayIndex {
        let size = self.effective_size();
        let position = self.effective_position();
        let center = Point::new(
            position.x + size.width as i32 / 2,
            position.y + size.height as i32 / 2,
        );
        self.displays
            .iter()
            .position(|d| d.bounds.contains(center))
            .unwrap_or(0)
    }

    fn effective_size(&self) -> Size {
        if let Some(mode) = self.fullscreen_mode {
            mode.size()
        } else if self.desktop_fullscreen {
            let index = self.display_under_normal_position();
            self.displays[index].bounds.size()
        } else if self.maximized {
            let index = self.display_under_normal_position();
            self.work_area(index).size()
        } else {
            self.size
        }
    }

    fn effective_position(&self) -> Point {
        if self.fullscreen_mode.is_some() || self.desktop_fullscreen || self.maximized {
            let index = self.display_under_normal_position();
            self.displays[index].bounds.origin()
        } else {
            self.position
        }
    }

    /// Display lookup by the stored windowed position, used while a
    /// fullscreen/maximized size would make the center lookup circular.
    fn display_under_normal_position(&self) -> DisplayIndex {
        let center = Point::new(
            self.position.x + self.size.width as i32 / 2,
            self.position.y + self.size.height as i32 / 2,
        );
        self.displays
            .iter()
            .position(|d| d.bounds.contains(center))
            .unwrap_or(0)
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformWindow for HeadlessPlatform {
    fn create(&mut self, descriptor: &WindowDescriptor) -> Result<(), PlatformError> {
        self.owner.assert_current("create");
        if self.created {
            return Err(PlatformError::WindowAlreadyCreated);
        }

        self.created = true;
        self.title = descriptor.title.clone();
        self.size = descriptor.size;
        self.position = descriptor.position.unwrap_or_else(|| {
            // Center on the primary display when unplaced.
            let bounds = self.displays[0].bounds;
            Point::new(
                bounds.x + (bounds.width - descriptor.size.width as i32) / 2,
                bounds.y + (bounds.height - descriptor.size.height as i32) / 2,
            )
        });
        self.resizable = descriptor.resizable;
        self.visible = descriptor.visible;
        self.bordered = true;
        self.focused = descriptor.visible;
        tracing::debug!(title = %self.title, "headless window created");
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), PlatformError> {
        self.owner.assert_current("destroy");
        self.require_window()?;
        self.created = false;
        self.events.clear();
        tracing::debug!("headless window destroyed");
        Ok(())
    }

    fn is_created(&self) -> bool {
        self.created
    }

    fn set_title(&mut self, title: &str) -> Result<(), PlatformError> {
        self.owner.assert_current("set_title");
        self.require_window()?;
        self.title = title.to_string();
        Ok(())
    }

    fn set_position(&mut self, position: Point) -> Result<(), PlatformError> {
        self.owner.assert_current("set_position");
        self.require_window()?;
        self.position = position;
        self.events.push_back(RawWindowEvent::Moved(position));
        Ok(())
    }

    fn set_size(&mut self, size: Size) -> Result<(), PlatformError> {
        self.owner.assert_current("set_size");
        self.require_window()?;
        self.size = size;
        self.events.push_back(RawWindowEvent::Resized(size));
        Ok(())
    }

    fn set_resizable(&mut self, resizable: bool) -> Result<(), PlatformError> {
        self.owner.assert_current("set_resizable");
        self.require_window()?;
        self.resizable = resizable;
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), PlatformError> {
        self.owner.assert_current("set_visible");
        self.require_window()?;
        self.visible = visible;
        Ok(())
    }

    fn set_fullscreen_mode(&mut self, mode: Option<&DisplayMode>) -> Result<(), PlatformError> {
        self.owner.assert_current("set_fullscreen_mode");
        self.require_window()?;
        let before = self.effective_size();
        self.fullscreen_mode = mode.copied();
        let after = self.effective_size();
        if before != after {
            self.events.push_back(RawWindowEvent::Resized(after));
        }
        Ok(())
    }

    fn set_desktop_fullscreen(&mut self, enabled: bool) -> Result<(), PlatformError> {
        self.owner.assert_current("set_desktop_fullscreen");
        self.require_window()?;
        let before = self.effective_size();
        self.desktop_fullscreen = enabled;
        let after = self.effective_size();
        if before != after {
            self.events.push_back(RawWindowEvent::Resized(after));
        }
        Ok(())
    }

    fn set_bordered(&mut self, bordered: bool) -> Result<(), PlatformError> {
        self.owner.assert_current("set_bordered");
        self.require_window()?;
        self.bordered = bordered;
        Ok(())
    }

    fn maximize(&mut self) -> Result<(), PlatformError> {
        self.owner.assert_current("maximize");
        self.require_window()?;
        self.minimized = false;
        self.maximized = true;
        self.events
            .push_back(RawWindowEvent::Resized(self.effective_size()));
        Ok(())
    }

    fn minimize(&mut self) -> Result<(), PlatformError> {
        self.owner.assert_current("minimize");
        self.require_window()?;
        self.minimized = true;
        self.events.push_back(RawWindowEvent::Minimized);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), PlatformError> {
        self.owner.assert_current("restore");
        self.require_window()?;
        let was_changed = self.minimized || self.maximized;
        self.minimized = false;
        self.maximized = false;
        if was_changed {
            self.events.push_back(RawWindowEvent::Restored);
            self.events.push_back(RawWindowEvent::Resized(self.size));
        }
        Ok(())
    }

    fn window_flags(&self) -> Result<WindowFlags, PlatformError> {
        self.require_window()?;
        Ok(WindowFlags {
            // Desktop fullscreen reports both bits, like SDL's
            // FULLSCREEN_DESKTOP containing the FULLSCREEN bit.
            fullscreen: self.fullscreen_mode.is_some() || self.desktop_fullscreen,
            desktop_fullscreen: self.desktop_fullscreen,
            maximized: self.maximized,
            minimized: self.minimized,
            focused: self.focused,
            visible: self.visible,
            bordered: self.bordered,
            resizable: self.resizable,
        })
    }

    fn drawable_size(&self) -> Result<Size, PlatformError> {
        self.require_window()?;
        if self.minimized {
            return Ok(Size::new(0, 0));
        }
        Ok(self.effective_size())
    }

    fn window_size(&self) -> Result<Size, PlatformError> {
        self.require_window()?;
        Ok(self.effective_size())
    }

    fn window_position(&self) -> Result<Point, PlatformError> {
        self.require_window()?;
        Ok(self.effective_position())
    }

    fn display_count(&self) -> Result<usize, PlatformError> {
        Ok(self.displays.len())
    }

    fn display_name(&self, index: DisplayIndex) -> Result<String, PlatformError> {
        Ok(self.display_at(index)?.name.clone())
    }

    fn display_bounds(&self, index: DisplayIndex) -> Result<Rect, PlatformError> {
        Ok(self.display_at(index)?.bounds)
    }

    fn display_modes(&self, index: DisplayIndex) -> Result<Vec<DisplayMode>, PlatformError> {
        Ok(self.display_at(index)?.modes.clone())
    }

    fn closest_display_mode(
        &self,
        index: DisplayIndex,
        request: &ModeRequest,
    ) -> Result<Option<DisplayMode>, PlatformError> {
        if self.fail_closest_mode_queries {
            return Err(PlatformError::ModeQueryFailed(
                "closest-mode queries disabled".to_string(),
            ));
        }
        let display = self.display_at(index)?;

        // Smallest mode that still fits the request; ties break on the
        // refresh rate (closest to the requested one, or highest when
        // the request leaves it unconstrained).
        let best = display
            .modes
            .iter()
            .filter(|m| m.width >= request.width && m.height >= request.height)
            .min_by_key(|m| {
                let area_excess = u64::from(m.width) * u64::from(m.height)
                    - u64::from(request.width) * u64::from(request.height);
                let refresh_key = match request.refresh_rate {
                    Some(hz) => m.refresh_rate.abs_diff(hz),
                    None => u32::MAX - m.refresh_rate,
                };
                (area_excess, refresh_key)
            })
            .copied();

        Ok(best)
    }

    fn current_display_mode(&self, index: DisplayIndex) -> Result<DisplayMode, PlatformError> {
        if self.fail_display_mode_queries {
            return Err(PlatformError::ModeQueryFailed(
                "display-mode queries disabled".to_string(),
            ));
        }
        Ok(self.display_at(index)?.desktop_mode)
    }

    fn window_display_mode(&self) -> Result<DisplayMode, PlatformError> {
        if self.fail_display_mode_queries {
            return Err(PlatformError::ModeQueryFailed(
                "display-mode queries disabled".to_string(),
            ));
        }
        self.require_window()?;
        match self.fullscreen_mode {
            Some(mode) => Ok(mode),
            None => Ok(self.displays[self.display_under_window()].desktop_mode),
        }
    }

    fn window_display_index(&self) -> Result<DisplayIndex, PlatformError> {
        self.require_window()?;
        Ok(self.display_under_window())
    }

    fn supported_window_modes(&self) -> Vec<WindowMode> {
        self.supported_modes.clone()
    }

    fn poll_events(&mut self) -> Vec<RawWindowEvent> {
        self.owner.assert_current("poll_events");
        self.events.drain(..).collect()
    }
}
