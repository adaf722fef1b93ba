//! Casement Platform Layer
//!
//! The capability seam between the window shell and a concrete windowing
//! backend.
//!
//! This crate defines:
//! - [`PlatformWindow`], the object-safe trait covering every native
//!   window operation the shell needs (create/destroy, geometry, border
//!   and fullscreen primitives, display/mode queries, event polling)
//! - [`RawWindowEvent`], the unnormalized event stream a backend delivers
//! - [`OwningThread`], the thread-affinity guard for window mutations
//! - [`HeadlessPlatform`], a deterministic in-memory backend used by the
//!   sandbox host and the test suite
//!
//! Backends are selected at construction and injected as
//! `Box<dyn PlatformWindow>`; there is no subclassing seam.

use casement_core_state::{
    Display, DisplayIndex, DisplayMode, ModeRequest, Point, Rect, Size, WindowFlags, WindowMode,
};
use std::thread::{self, ThreadId};
use thiserror::Error;

pub mod headless;

pub use headless::{HeadlessDisplay, HeadlessPlatform};

/// Errors reported by a platform backend.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("No native window exists; create one first")]
    WindowNotCreated,

    #[error("A native window already exists")]
    WindowAlreadyCreated,

    #[error("Display index {0} is out of bounds ({1} displays attached)")]
    InvalidDisplayIndex(DisplayIndex, usize),

    #[error("Display mode query failed: {0}")]
    ModeQueryFailed(String),

    #[error("Platform backend error: {0}")]
    Backend(String),
}

/// Parameters for creating the native window.
#[derive(Debug, Clone)]
pub struct WindowDescriptor {
    /// Initial window title.
    pub title: String,
    /// Initial client size in pixels.
    pub size: Size,
    /// Initial position; `None` lets the platform place the window.
    pub position: Option<Point>,
    /// Whether the user may resize the window.
    pub resizable: bool,
    /// Whether the window is shown immediately.
    pub visible: bool,
}

impl Default for WindowDescriptor {
    fn default() -> Self {
        Self {
            title: "Casement".to_string(),
            size: Size::new(1280, 720),
            position: None,
            resizable: true,
            visible: true,
        }
    }
}

/// Raw, unnormalized window events as a backend delivers them.
///
/// Payload coordinates are whatever the OS put in the event and may be
/// stale on some platforms; consumers re-query the live value instead of
/// trusting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawWindowEvent {
    /// The window was moved. The payload is the OS-reported position.
    Moved(Point),
    /// The window was resized. The payload is the OS-reported client size.
    Resized(Size),
    /// The window gained input focus.
    FocusGained,
    /// The window lost input focus.
    FocusLost,
    /// The window was minimized.
    Minimized,
    /// The window was restored from the minimized state.
    Restored,
    /// The pointer entered the window.
    MouseEntered,
    /// The pointer left the window.
    MouseLeft,
    /// The user asked to close the window.
    CloseRequested,
}

/// Guard for the single-owner-thread discipline.
///
/// Captured on the thread that constructs the backend; every window
/// mutation asserts it. Calling a mutation from another thread is a
/// programming error and panics immediately rather than risking
/// undefined platform behavior.
#[derive(Debug, Clone)]
pub struct OwningThread {
    id: ThreadId,
}

impl OwningThread {
    /// Capture the current thread as the owning thread.
    pub fn capture() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    /// Check whether the current thread is the owning thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Panic unless called on the owning thread.
    ///
    /// `operation` names the violated call for the panic message.
    pub fn assert_current(&self, operation: &str) {
        if !self.is_current() {
            panic!(
                "`{operation}` must run on the owning window thread {:?}, called from {:?}",
                self.id,
                thread::current().id()
            );
        }
    }
}

/// Capability interface for one native window and its displays.
///
/// One instance manages at most one window. All mutating methods must be
/// called on the owning thread; backends enforce this via
/// [`OwningThread::assert_current`]. Query methods are cheap and
/// synchronous.
///
/// Restore semantics after minimize are platform-dependent: backends
/// report whatever geometry the OS restores to, and callers re-query
/// rather than assuming the pre-minimize geometry comes back.
pub trait PlatformWindow {
    /// Create the native window.
    fn create(&mut self, descriptor: &WindowDescriptor) -> Result<(), PlatformError>;

    /// Destroy the native window. Further events for it are dropped.
    fn destroy(&mut self) -> Result<(), PlatformError>;

    /// Whether the native window currently exists.
    fn is_created(&self) -> bool;

    /// Set the window title.
    fn set_title(&mut self, title: &str) -> Result<(), PlatformError>;

    /// Move the window so its top-left corner is at `position`.
    fn set_position(&mut self, position: Point) -> Result<(), PlatformError>;

    /// Resize the window's client area.
    fn set_size(&mut self, size: Size) -> Result<(), PlatformError>;

    /// Allow or forbid user resizing.
    fn set_resizable(&mut self, resizable: bool) -> Result<(), PlatformError>;

    /// Show or hide the window.
    fn set_visible(&mut self, visible: bool) -> Result<(), PlatformError>;

    /// Enter exclusive fullscreen with the given mode, or leave exclusive
    /// fullscreen when `mode` is `None`.
    fn set_fullscreen_mode(&mut self, mode: Option<&DisplayMode>) -> Result<(), PlatformError>;

    /// Enter or leave fullscreen at desktop resolution.
    ///
    /// This is a distinct primitive from [`set_fullscreen_mode`]
    /// (no mode switch happens); both report as fullscreen in the flags.
    ///
    /// [`set_fullscreen_mode`]: PlatformWindow::set_fullscreen_mode
    fn set_desktop_fullscreen(&mut self, enabled: bool) -> Result<(), PlatformError>;

    /// Add or remove the window border/title bar.
    fn set_bordered(&mut self, bordered: bool) -> Result<(), PlatformError>;

    /// Maximize the window. The OS decides the final pixel size.
    fn maximize(&mut self) -> Result<(), PlatformError>;

    /// Minimize/iconify the window.
    fn minimize(&mut self) -> Result<(), PlatformError>;

    /// Restore the window from the minimized or maximized state.
    fn restore(&mut self) -> Result<(), PlatformError>;

    /// Snapshot of the OS-reported window flags.
    fn window_flags(&self) -> Result<WindowFlags, PlatformError>;

    /// Drawable size in physical pixels.
    ///
    /// May legitimately be zero while minimized on some platforms.
    fn drawable_size(&self) -> Result<Size, PlatformError>;

    /// Client size in logical pixels.
    fn window_size(&self) -> Result<Size, PlatformError>;

    /// Position of the window's top-left corner.
    fn window_position(&self) -> Result<Point, PlatformError>;

    /// Number of attached displays.
    fn display_count(&self) -> Result<usize, PlatformError>;

    /// Name of a display.
    fn display_name(&self, index: DisplayIndex) -> Result<String, PlatformError>;

    /// Bounds of a display in desktop coordinates.
    fn display_bounds(&self, index: DisplayIndex) -> Result<Rect, PlatformError>;

    /// All modes a display offers, in the platform's preference order.
    fn display_modes(&self, index: DisplayIndex) -> Result<Vec<DisplayMode>, PlatformError>;

    /// The closest supported mode to `request` on a display, or `None`
    /// when nothing satisfies the request.
    fn closest_display_mode(
        &self,
        index: DisplayIndex,
        request: &ModeRequest,
    ) -> Result<Option<DisplayMode>, PlatformError>;

    /// The display's current desktop mode.
    fn current_display_mode(&self, index: DisplayIndex) -> Result<DisplayMode, PlatformError>;

    /// The mode the window uses when it goes exclusive fullscreen.
    fn window_display_mode(&self) -> Result<DisplayMode, PlatformError>;

    /// Index of the display the window is currently on.
    fn window_display_index(&self) -> Result<DisplayIndex, PlatformError>;

    /// Window modes this backend can represent.
    fn supported_window_modes(&self) -> Vec<WindowMode>;

    /// Drain pending raw events in delivery order.
    fn poll_events(&mut self) -> Vec<RawWindowEvent>;

    /// Assemble the full snapshot of one display.
    fn display(&self, index: DisplayIndex) -> Result<Display, PlatformError> {
        Ok(Display {
            index,
            name: self.display_name(index)?,
            bounds: self.display_bounds(index)?,
            modes: self.display_modes(index)?,
        })
    }

    /// Assemble snapshots of every attached display.
    fn displays(&self) -> Result<Vec<Display>, PlatformError> {
        (0..self.display_count()?)
            .map(|index| self.display(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_thread_accepts_owner() {
        let owner = OwningThread::capture();
        assert!(owner.is_current());
        owner.assert_current("test operation");
    }

    #[test]
    fn test_owning_thread_rejects_other_threads() {
        let owner = OwningThread::capture();
        let result = thread::spawn(move || owner.assert_current("set_position")).join();
        assert!(result.is_err(), "cross-thread mutation must panic");
    }

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = WindowDescriptor::default();
        assert_eq!(descriptor.size, Size::new(1280, 720));
        assert!(descriptor.resizable);
        assert!(descriptor.visible);
        assert!(descriptor.position.is_none());
    }
}
