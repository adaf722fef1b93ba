//! Bidirectional sync between live window geometry and the persisted
//! settings store.
//!
//! Outbound (store): absolute geometry becomes display-relative
//! fractions plus a windowed size. Inbound (read): fractions become an
//! absolute position on the persisted display.
//!
//! Stores only run while the window state is `Normal`; the geometry of
//! maximized, fullscreen, or minimized windows is not a meaningful user
//! placement. Size stores hold a reentrancy guard so the size-changed
//! notification they trigger is recognizable as programmatic and does
//! not loop back into a second store.

use crate::settings::WindowSettings;
use crate::ShellError;
use casement_core_state::{fraction_to_position, position_to_fraction, Point, WindowState};
use casement_platform::PlatformWindow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Translates between absolute window geometry and persisted settings.
pub struct ConfigSyncBridge {
    storing: Arc<AtomicBool>,
}

impl ConfigSyncBridge {
    pub fn new() -> Self {
        Self {
            storing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a programmatic store is in progress.
    ///
    /// Settings listeners consult this to tell a store-triggered
    /// notification apart from a user edit.
    pub fn is_storing(&self) -> bool {
        self.storing.load(Ordering::SeqCst)
    }

    /// Shared handle to the guard flag, for wiring into listeners.
    pub(crate) fn storing_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.storing)
    }

    /// Persist the window position as display-relative fractions.
    ///
    /// No-op unless `state` is `Normal`. Also records which display the
    /// window is on, so the read path restores onto the same display.
    pub fn store_position(
        &self,
        platform: &dyn PlatformWindow,
        settings: &WindowSettings,
        state: WindowState,
    ) -> Result<(), ShellError> {
        if state != WindowState::Normal {
            trace!(?state, "position store skipped in non-normal state");
            return Ok(());
        }

        let index = platform.window_display_index()?;
        let bounds = platform.display_bounds(index)?;
        let position = platform.window_position()?;
        let size = platform.window_size()?;

        let fx = position_to_fraction(position.x, size.width as i32, bounds.x, bounds.width);
        let fy = position_to_fraction(position.y, size.height as i32, bounds.y, bounds.height);

        settings.relative_x.set(fx);
        settings.relative_y.set(fy);
        settings.display_index.set(index);
        trace!(fx, fy, display = index, "stored window position");
        Ok(())
    }

    /// Persist the windowed client size.
    ///
    /// No-op unless `state` is `Normal`. Holds the reentrancy guard for
    /// the duration of the write.
    pub fn store_size(
        &self,
        platform: &dyn PlatformWindow,
        settings: &WindowSettings,
        state: WindowState,
    ) -> Result<(), ShellError> {
        if state != WindowState::Normal {
            trace!(?state, "size store skipped in non-normal state");
            return Ok(());
        }

        let _guard = StoreGuard::engage(&self.storing);
        let size = platform.window_size()?;
        settings.windowed_width.set(size.width);
        settings.windowed_height.set(size.height);
        trace!(width = size.width, height = size.height, "stored windowed size");
        Ok(())
    }

    /// Compute the absolute window position from the persisted fractions.
    ///
    /// A persisted display that no longer exists falls back to the
    /// primary display.
    pub fn read_position(
        &self,
        platform: &dyn PlatformWindow,
        settings: &WindowSettings,
    ) -> Result<Point, ShellError> {
        let count = platform.display_count()?;
        let mut index = settings.display_index.get();
        if index >= count {
            warn!(
                index,
                displays = count,
                "persisted display no longer exists, using the primary display"
            );
            index = 0;
        }

        let bounds = platform.display_bounds(index)?;
        let size = platform.window_size()?;

        Ok(Point::new(
            fraction_to_position(
                settings.relative_x.get(),
                size.width as i32,
                bounds.x,
                bounds.width,
            ),
            fraction_to_position(
                settings.relative_y.get(),
                size.height as i32,
                bounds.y,
                bounds.height,
            ),
        ))
    }
}

impl Default for ConfigSyncBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard: the flag is `true` only while a store is mid-write.
struct StoreGuard {
    flag: Arc<AtomicBool>,
}

impl StoreGuard {
    fn engage(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self {
            flag: Arc::clone(flag),
        }
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
