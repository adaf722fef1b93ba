//! Normalization of raw platform events into the public event set.
//!
//! Raw events are noisy: payloads can be stale, a resize can report a
//! zero drawable mid-minimize, and focus events repeat. The dispatcher
//! tracks the last observed geometry and focus, re-queries the platform
//! where payloads cannot be trusted, and emits a public event only when
//! something actually changed.

use casement_core_state::{Point, Size, WindowState};
use casement_platform::{PlatformWindow, RawWindowEvent};
use tracing::trace;

/// Events observed by shell consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window position changed. Carries the re-queried position.
    Moved(Point),
    /// The drawable size changed. Carries the new drawable pixel size.
    Resized(Size),
    /// The reconciled window state changed.
    StateChanged(WindowState),
    /// Input focus was gained or lost.
    FocusChanged(bool),
    /// The pointer entered the window.
    MouseEntered,
    /// The pointer left the window.
    MouseLeft,
    /// The user asked the window to close.
    CloseRequested,
}

/// Tracks observed window geometry and turns raw events into
/// [`WindowEvent`]s. Owned by the controller.
pub(crate) struct EventDispatcher {
    position: Point,
    size: Size,
    client_size: Size,
    focused: bool,
}

impl EventDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            position: Point::new(0, 0),
            size: Size::new(0, 0),
            client_size: Size::new(0, 0),
            focused: false,
        }
    }

    /// Seed the tracked values from the live window, after creation.
    pub(crate) fn prime(&mut self, platform: &dyn PlatformWindow) {
        if let Ok(position) = platform.window_position() {
            self.position = position;
        }
        if let Ok(size) = platform.drawable_size() {
            self.size = size;
        }
        if let Ok(client) = platform.window_size() {
            self.client_size = client;
        }
        if let Ok(flags) = platform.window_flags() {
            self.focused = flags.focused;
        }
    }

    /// Last observed window position.
    pub(crate) fn position(&self) -> Point {
        self.position
    }

    /// Last observed drawable size in pixels.
    pub(crate) fn size(&self) -> Size {
        self.size
    }

    /// Last observed client size in window coordinates.
    pub(crate) fn client_size(&self) -> Size {
        self.client_size
    }

    pub(crate) fn focused(&self) -> bool {
        self.focused
    }

    /// Re-query the live geometry and emit events for anything that
    /// changed. Used right after a transition so observers see the new
    /// geometry in the same tick instead of waiting for the raw events.
    pub(crate) fn refresh(&mut self, platform: &dyn PlatformWindow, out: &mut Vec<WindowEvent>) {
        if !platform.is_created() {
            return;
        }
        if let Ok(position) = platform.window_position() {
            if position != self.position {
                self.position = position;
                out.push(WindowEvent::Moved(position));
            }
        }
        if let Ok(drawable) = platform.drawable_size() {
            if !drawable.is_empty() && drawable != self.size {
                self.size = drawable;
                out.push(WindowEvent::Resized(drawable));
            }
        }
        if let Ok(client) = platform.window_size() {
            self.client_size = client;
        }
    }

    /// Normalize one raw event, appending any public events to `out`.
    ///
    /// Everything received before the native window exists is dropped:
    /// some platforms deliver queued events for a handle that is not
    /// valid yet.
    pub(crate) fn dispatch(
        &mut self,
        platform: &dyn PlatformWindow,
        raw: RawWindowEvent,
        out: &mut Vec<WindowEvent>,
    ) {
        if !platform.is_created() {
            trace!(?raw, "dropping event for a window that does not exist yet");
            return;
        }

        match raw {
            RawWindowEvent::Moved(payload) => {
                // Payloads lag behind on some platforms; the live
                // position is authoritative.
                let Ok(position) = platform.window_position() else {
                    trace!("position query failed during move, ignoring");
                    return;
                };
                if payload != position {
                    trace!(?payload, ?position, "move payload is stale");
                }
                if position != self.position {
                    self.position = position;
                    out.push(WindowEvent::Moved(position));
                }
            }
            RawWindowEvent::Resized(_) => {
                let Ok(drawable) = platform.drawable_size() else {
                    trace!("drawable query failed during resize, ignoring");
                    return;
                };
                if drawable.is_empty() {
                    trace!("ignoring zero-sized drawable");
                    return;
                }
                if let Ok(client) = platform.window_size() {
                    self.client_size = client;
                }
                if drawable != self.size {
                    self.size = drawable;
                    out.push(WindowEvent::Resized(drawable));
                }
            }
            RawWindowEvent::FocusGained => {
                if !self.focused {
                    self.focused = true;
                    out.push(WindowEvent::FocusChanged(true));
                }
            }
            RawWindowEvent::FocusLost => {
                if self.focused {
                    self.focused = false;
                    out.push(WindowEvent::FocusChanged(false));
                }
            }
            RawWindowEvent::Minimized | RawWindowEvent::Restored => {
                // State changes surface through reconciliation, which
                // re-derives the state from the window flags.
                trace!(?raw, "state-bearing event, deferring to reconciliation");
            }
            RawWindowEvent::MouseEntered => out.push(WindowEvent::MouseEntered),
            RawWindowEvent::MouseLeft => out.push(WindowEvent::MouseLeft),
            RawWindowEvent::CloseRequested => out.push(WindowEvent::CloseRequested),
        }
    }
}
