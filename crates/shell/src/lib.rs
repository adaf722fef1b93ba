//! Window lifecycle shell.
//!
//! Sits between a platform backend (`casement-platform`) and the
//! application: stages state requests from any thread, reconciles them
//! against the OS-reported window condition once per tick, resolves
//! fullscreen display modes with graceful degradation, and keeps the
//! persisted window settings in two-way sync with live geometry.
//!
//! The entry point is [`WindowController`]; everything else supports
//! it.

pub mod config_sync;
pub mod controller;
pub mod events;
pub mod modes;
pub mod scheduler;
pub mod settings;

pub use config_sync::ConfigSyncBridge;
pub use controller::{WindowController, WindowProxy};
pub use events::WindowEvent;
pub use modes::resolve_display_mode;
pub use scheduler::{CommandScheduler, CommandSender, WindowCommand};
pub use settings::{Bindable, WindowSettings};

use casement_core_state::DisplayIndex;
use casement_platform::PlatformError;
use thiserror::Error;

/// Errors surfaced by shell operations.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Every display-mode resolution tier was exhausted; the platform
    /// cannot report any mode for the display.
    #[error("no display mode resolvable for {width}x{height} on display {display}")]
    ModeResolution {
        display: DisplayIndex,
        width: u32,
        height: u32,
    },

    /// A platform capability failed.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}
