//! Display mode resolution.
//!
//! Picks the concrete mode for exclusive fullscreen from a requested
//! resolution. Resolution degrades in three tiers: the closest match
//! for the request itself, then the closest match for the display's
//! native bounds with no refresh-rate constraint, then the mode the
//! window is currently presented in (the display's desktop mode when
//! the window query cannot answer). A failed tier falls through to the
//! next; only exhausting all three is an error.

use crate::ShellError;
use casement_core_state::{DisplayIndex, DisplayMode, ModeRequest};
use casement_platform::PlatformWindow;
use tracing::{debug, error, trace};

/// Resolve `request` to a concrete mode on `display_index`.
pub fn resolve_display_mode(
    platform: &dyn PlatformWindow,
    display_index: DisplayIndex,
    request: &ModeRequest,
) -> Result<DisplayMode, ShellError> {
    match platform.closest_display_mode(display_index, request) {
        Ok(Some(mode)) => {
            trace!(
                display = display_index,
                width = mode.width,
                height = mode.height,
                refresh = mode.refresh_rate,
                "resolved requested mode"
            );
            return Ok(mode);
        }
        Ok(None) => debug!(
            display = display_index,
            ?request,
            "no mode satisfies the request, widening to the display bounds"
        ),
        Err(error) => debug!(
            display = display_index,
            ?request,
            %error,
            "closest-mode query failed, widening to the display bounds"
        ),
    }

    match platform.display_bounds(display_index) {
        Ok(bounds) => {
            let widened = ModeRequest::new(bounds.width as u32, bounds.height as u32);
            match platform.closest_display_mode(display_index, &widened) {
                Ok(Some(mode)) => {
                    debug!(
                        display = display_index,
                        width = mode.width,
                        height = mode.height,
                        refresh = mode.refresh_rate,
                        "resolved mode at the display's native bounds"
                    );
                    return Ok(mode);
                }
                Ok(None) => debug!(
                    display = display_index,
                    ?widened,
                    "no mode at the display bounds, falling back to the presented mode"
                ),
                Err(error) => debug!(
                    display = display_index,
                    ?widened,
                    %error,
                    "bounds-mode query failed, falling back to the presented mode"
                ),
            }
        }
        Err(error) => debug!(
            display = display_index,
            %error,
            "display bounds query failed, falling back to the presented mode"
        ),
    }

    match platform.window_display_mode() {
        Ok(mode) => {
            debug!(
                display = display_index,
                width = mode.width,
                height = mode.height,
                refresh = mode.refresh_rate,
                "using the window's presented mode"
            );
            return Ok(mode);
        }
        Err(error) => debug!(
            display = display_index,
            %error,
            "window mode query failed, falling back to the desktop mode"
        ),
    }

    match platform.current_display_mode(display_index) {
        Ok(mode) => {
            debug!(
                display = display_index,
                width = mode.width,
                height = mode.height,
                refresh = mode.refresh_rate,
                "using the display's desktop mode"
            );
            Ok(mode)
        }
        Err(source) => {
            error!(
                display = display_index,
                width = request.width,
                height = request.height,
                %source,
                "display mode resolution exhausted"
            );
            Err(ShellError::ModeResolution {
                display: display_index,
                width: request.width,
                height: request.height,
            })
        }
    }
}
