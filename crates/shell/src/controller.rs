//! The window state controller.
//!
//! Owns the platform window and reconciles three sources of truth once
//! per tick: staged state requests (from any thread), the persisted
//! settings store, and the OS-reported window flags. All platform
//! mutation happens here, on the owning thread.

use crate::config_sync::ConfigSyncBridge;
use crate::events::{EventDispatcher, WindowEvent};
use crate::modes::resolve_display_mode;
use crate::scheduler::{CommandScheduler, CommandSender};
use crate::settings::{Bindable, WindowSettings};
use crate::ShellError;
use casement_core_state::{DisplayMode, Point, Size, WindowConfig, WindowMode, WindowState};
use casement_platform::{OwningThread, PlatformWindow, WindowDescriptor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Drives one native window through its state lifecycle.
///
/// Construct it on the thread that will run the event loop; that thread
/// becomes the owning thread, and `tick()` must be called from it once
/// per loop iteration. Use [`WindowController::proxy`] to stage state
/// requests or schedule platform commands from other threads.
pub struct WindowController {
    platform: Box<dyn PlatformWindow>,
    owner: OwningThread,
    settings: WindowSettings,
    scheduler: CommandScheduler,
    bridge: ConfigSyncBridge,
    dispatcher: EventDispatcher,
    listeners: Vec<Box<dyn FnMut(&WindowEvent)>>,
    pending: Arc<Mutex<Option<WindowState>>>,
    state: WindowState,
    effective_mode: Option<DisplayMode>,
    window_maximized: Arc<AtomicBool>,
    geometry_dirty: Arc<AtomicBool>,
    mode_sync_guard: Arc<AtomicBool>,
    title: String,
}

impl WindowController {
    /// Create the native window and wire the settings store to it.
    ///
    /// The window opens at the persisted windowed size and position. A
    /// persisted non-windowed mode is staged and applied on the first
    /// `tick()`.
    pub fn new(
        mut platform: Box<dyn PlatformWindow>,
        config: &WindowConfig,
        title: &str,
    ) -> Result<Self, ShellError> {
        let owner = OwningThread::capture();
        let settings = WindowSettings::from_config(config);
        let bridge = ConfigSyncBridge::new();

        platform.create(&WindowDescriptor {
            title: title.to_owned(),
            size: settings.windowed_size(),
            position: None,
            resizable: true,
            visible: true,
        })?;
        let position = bridge.read_position(platform.as_ref(), &settings)?;
        platform.set_position(position)?;

        let mut dispatcher = EventDispatcher::new();
        dispatcher.prime(platform.as_ref());

        let state = platform
            .window_flags()
            .map(|flags| WindowState::from_flags(&flags))
            .unwrap_or(WindowState::Normal);

        let pending = Arc::new(Mutex::new(None));
        let window_maximized = Arc::new(AtomicBool::new(false));
        let geometry_dirty = Arc::new(AtomicBool::new(false));
        let mode_sync_guard = Arc::new(AtomicBool::new(false));

        // Inbound geometry edits mark the window dirty for the next
        // tick, unless they came from our own store path.
        let storing = bridge.storing_handle();
        mark_geometry_dirty(&settings.relative_x, &storing, &geometry_dirty);
        mark_geometry_dirty(&settings.relative_y, &storing, &geometry_dirty);
        mark_geometry_dirty(&settings.windowed_width, &storing, &geometry_dirty);
        mark_geometry_dirty(&settings.windowed_height, &storing, &geometry_dirty);
        mark_geometry_dirty(&settings.display_index, &storing, &geometry_dirty);

        // A mode write stages the matching state, sharing the same
        // depth-1 slot as request_state so the last write wins.
        {
            let pending = Arc::clone(&pending);
            let memory = Arc::clone(&window_maximized);
            let guard = Arc::clone(&mode_sync_guard);
            settings.mode.on_change(move |mode| {
                if guard.load(Ordering::SeqCst) {
                    return;
                }
                stage_pending(&pending, state_for_mode(*mode, memory.load(Ordering::SeqCst)));
            });
        }

        if config.mode != WindowMode::Windowed {
            stage_pending(&pending, state_for_mode(config.mode, false));
        }

        Ok(Self {
            platform,
            owner,
            settings,
            scheduler: CommandScheduler::new(),
            bridge,
            dispatcher,
            listeners: Vec::new(),
            pending,
            state,
            effective_mode: None,
            window_maximized,
            geometry_dirty,
            mode_sync_guard,
            title: title.to_owned(),
        })
    }

    /// Stage a state change; it applies on the next `tick()`.
    ///
    /// Non-blocking and callable from any thread through a proxy. A
    /// second request before the next tick replaces the first.
    pub fn request_state(&self, state: WindowState) {
        stage_pending(&self.pending, state);
    }

    /// Handle for staging requests and commands from other threads.
    pub fn proxy(&self) -> WindowProxy {
        WindowProxy {
            pending: Arc::clone(&self.pending),
            commands: self.scheduler.sender(),
        }
    }

    /// Subscribe to public window events. Listeners fire on the owning
    /// thread, in subscription order.
    pub fn on_event(&mut self, listener: impl FnMut(&WindowEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Run one reconciliation pass. Call once per event-loop iteration,
    /// on the owning thread.
    ///
    /// Order: drain scheduled commands, poll and normalize raw events,
    /// apply external settings edits, reconcile the state (staged
    /// request first, otherwise re-derive from the OS flags), persist
    /// changed geometry, then fire collected events.
    ///
    /// An error means a staged transition could not be applied and was
    /// dropped; event handling and persistence problems are logged and
    /// never interrupt the tick.
    pub fn tick(&mut self) -> Result<(), ShellError> {
        self.owner.assert_current("tick");
        let mut out = Vec::new();

        self.scheduler.drain(self.platform.as_mut());

        for raw in self.platform.poll_events() {
            self.dispatcher.dispatch(self.platform.as_ref(), raw, &mut out);
        }

        self.apply_external_settings();
        let result = self.reconcile(&mut out);
        self.persist_geometry_events(&out);

        for event in &out {
            for listener in &mut self.listeners {
                listener(event);
            }
        }
        result
    }

    /// Advance the window mode to the next one the platform supports.
    ///
    /// Unsupported modes are skipped. If no other mode is supported the
    /// current mode is kept and nothing is staged.
    pub fn cycle_mode(&mut self) {
        let supported = self.platform.supported_window_modes();
        let current = self.settings.mode.get();
        let mut candidate = current.next();
        while candidate != current && !supported.contains(&candidate) {
            candidate = candidate.next();
        }
        if candidate == current {
            debug!(?current, "no alternate window mode supported");
            return;
        }
        self.settings.mode.set(candidate);
    }

    /// Destroy the native window. Later ticks become no-ops apart from
    /// draining any queued commands.
    pub fn shutdown(&mut self) -> Result<(), ShellError> {
        self.owner.assert_current("shutdown");
        debug!("destroying the native window");
        self.platform.destroy()?;
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), ShellError> {
        self.owner.assert_current("set_title");
        self.platform.set_title(title)?;
        self.title = title.to_owned();
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The reconciled window state as of the last tick.
    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn mode(&self) -> WindowMode {
        self.settings.mode.get()
    }

    /// Drawable size in physical pixels.
    pub fn size(&self) -> Size {
        self.dispatcher.size()
    }

    /// Client size in window coordinates.
    pub fn client_size(&self) -> Size {
        self.dispatcher.client_size()
    }

    /// Physical-to-logical pixel ratio.
    pub fn scale(&self) -> f64 {
        let client = self.dispatcher.client_size();
        if client.width == 0 {
            return 1.0;
        }
        f64::from(self.dispatcher.size().width) / f64::from(client.width)
    }

    pub fn position(&self) -> Point {
        self.dispatcher.position()
    }

    pub fn focused(&self) -> bool {
        self.dispatcher.focused()
    }

    /// The display mode the window is effectively presented in, from
    /// the last transition's re-query.
    pub fn effective_display_mode(&self) -> Option<DisplayMode> {
        self.effective_mode
    }

    /// The live settings store backing this window.
    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Tick phases
    // ------------------------------------------------------------------

    /// Apply settings edited from outside (another thread, a settings
    /// UI). Runs only while windowed; in any other state the dirty
    /// flag is left in place so the edit still applies on the first
    /// windowed tick, however the window got there.
    fn apply_external_settings(&mut self) {
        if self.state != WindowState::Normal {
            return;
        }
        let staged = self
            .pending
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        if staged {
            // The transition reads the settings itself.
            return;
        }
        if !self.geometry_dirty.swap(false, Ordering::SeqCst) {
            return;
        }

        let size = self.settings.windowed_size();
        if size != self.dispatcher.client_size() {
            if let Err(error) = self.platform.set_size(size) {
                warn!(%error, "failed to apply the edited windowed size");
            }
        }
        match self.bridge.read_position(self.platform.as_ref(), &self.settings) {
            Ok(position) => {
                if position != self.dispatcher.position() {
                    if let Err(error) = self.platform.set_position(position) {
                        warn!(%error, "failed to apply the edited window position");
                    }
                }
            }
            Err(error) => warn!(%error, "failed to lay out the edited window position"),
        }
    }

    fn reconcile(&mut self, out: &mut Vec<WindowEvent>) -> Result<(), ShellError> {
        let pending = match self.pending.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(target) = pending {
            return self.apply_transition(target, out);
        }

        // No request: fold in changes made behind our back (the user
        // maximizing via the title bar, the OS restoring the window).
        let flags = match self.platform.window_flags() {
            Ok(flags) => flags,
            Err(error) => {
                trace!(%error, "window flags unavailable, skipping state derivation");
                return Ok(());
            }
        };
        let derived = WindowState::from_flags(&flags);
        if derived != self.state {
            debug!(previous = ?self.state, current = ?derived, "window state changed externally");
            self.note_state(derived, out);
        }
        Ok(())
    }

    /// Move the window to `target`, always passing through a bordered,
    /// non-fullscreen baseline first: platforms reject partial mode
    /// changes while stale fullscreen or border flags are still set.
    fn apply_transition(
        &mut self,
        target: WindowState,
        out: &mut Vec<WindowEvent>,
    ) -> Result<(), ShellError> {
        debug!(?target, "applying window state transition");

        if target != WindowState::Minimized {
            if let Ok(flags) = self.platform.window_flags() {
                if flags.minimized {
                    // An iconified window cannot change mode.
                    self.platform.restore()?;
                }
            }
        }

        self.platform.set_desktop_fullscreen(false)?;
        self.platform.set_fullscreen_mode(None)?;
        self.platform.set_bordered(true)?;

        match target {
            WindowState::Normal => {
                self.platform.restore()?;
                self.platform.set_size(self.settings.windowed_size())?;
                self.platform.set_resizable(true)?;
                let position = self.bridge.read_position(self.platform.as_ref(), &self.settings)?;
                self.platform.set_position(position)?;
            }
            WindowState::Fullscreen => {
                let request = self.settings.fullscreen_request();
                let display = self.platform.window_display_index().unwrap_or_else(|error| {
                    debug!(%error, "window display query failed, using the persisted display");
                    self.settings.display_index.get()
                });
                let mode = resolve_display_mode(self.platform.as_ref(), display, &request)?;
                self.platform.set_fullscreen_mode(Some(&mode))?;
            }
            WindowState::BorderlessFullscreen => {
                self.platform.set_desktop_fullscreen(true)?;
            }
            WindowState::Maximized => {
                self.platform.restore()?;
                self.platform.maximize()?;
            }
            WindowState::Minimized => {
                self.platform.minimize()?;
            }
        }

        self.refresh_effective_mode(target);
        self.dispatcher.refresh(self.platform.as_ref(), out);

        // Trust the flags over the request: if the platform did not
        // honor it, the tracked state must say so.
        let achieved = self
            .platform
            .window_flags()
            .map(|flags| WindowState::from_flags(&flags))
            .unwrap_or(target);
        self.note_state(achieved, out);
        Ok(())
    }

    /// Re-query which mode the window ended up presented in. Never
    /// fails the transition: if every query fails the previous value is
    /// kept under a warning.
    fn refresh_effective_mode(&mut self, target: WindowState) {
        let tracked = self.settings.display_index.get();
        let index = match self.platform.window_display_index() {
            Ok(reported) => {
                if reported != tracked {
                    warn!(
                        tracked,
                        reported,
                        "tracked display index disagrees with the platform"
                    );
                }
                reported
            }
            Err(error) => {
                debug!(%error, "window display query failed, using the tracked index");
                tracked
            }
        };

        // Exclusive fullscreen asks the window for its mode first; any
        // other state is presented in the desktop mode.
        let mode = if target == WindowState::Fullscreen {
            self.platform.window_display_mode().or_else(|error| {
                debug!(%error, "fullscreen mode query failed, trying the desktop mode");
                self.platform.current_display_mode(index)
            })
        } else {
            self.platform.current_display_mode(index).or_else(|error| {
                debug!(%error, "desktop mode query failed, trying the window mode");
                self.platform.window_display_mode()
            })
        };

        match mode {
            Ok(mode) => self.effective_mode = Some(mode),
            Err(error) => {
                warn!(%error, "effective mode re-query failed, keeping the previous mode");
            }
        }
    }

    fn note_state(&mut self, state: WindowState, out: &mut Vec<WindowEvent>) {
        if state == self.state {
            return;
        }
        self.state = state;

        // Remember whether the last resting windowed state was
        // maximized; leaving fullscreen returns there.
        match state {
            WindowState::Maximized => self.window_maximized.store(true, Ordering::SeqCst),
            WindowState::Normal => self.window_maximized.store(false, Ordering::SeqCst),
            _ => {}
        }

        if let Some(mode) = mode_for_state(state) {
            // Writeback must not restage the state it reflects.
            self.mode_sync_guard.store(true, Ordering::SeqCst);
            self.settings.mode.set(mode);
            self.mode_sync_guard.store(false, Ordering::SeqCst);
        }

        out.push(WindowEvent::StateChanged(state));
    }

    fn persist_geometry_events(&self, events: &[WindowEvent]) {
        let moved = events.iter().any(|e| matches!(e, WindowEvent::Moved(_)));
        let resized = events.iter().any(|e| matches!(e, WindowEvent::Resized(_)));

        if moved {
            if let Err(error) =
                self.bridge
                    .store_position(self.platform.as_ref(), &self.settings, self.state)
            {
                warn!(%error, "failed to store the window position");
            }
        }
        if resized {
            if let Err(error) =
                self.bridge
                    .store_size(self.platform.as_ref(), &self.settings, self.state)
            {
                warn!(%error, "failed to store the windowed size");
            }
        }
    }
}

/// Cloneable cross-thread handle to a [`WindowController`].
#[derive(Clone)]
pub struct WindowProxy {
    pending: Arc<Mutex<Option<WindowState>>>,
    commands: CommandSender,
}

impl WindowProxy {
    /// Stage a state change for the next tick. Last write wins.
    pub fn request_state(&self, state: WindowState) {
        stage_pending(&self.pending, state);
    }

    /// Queue a platform command for the next tick's drain.
    pub fn schedule(&self, command: impl FnOnce(&mut dyn PlatformWindow) + Send + 'static) {
        self.commands.schedule(command);
    }
}

fn stage_pending(slot: &Mutex<Option<WindowState>>, state: WindowState) {
    if let Ok(mut pending) = slot.lock() {
        if let Some(previous) = pending.replace(state) {
            trace!(?previous, ?state, "unapplied state request overwritten");
        }
    }
}

fn mark_geometry_dirty<T: Clone + PartialEq>(
    bindable: &Bindable<T>,
    storing: &Arc<AtomicBool>,
    dirty: &Arc<AtomicBool>,
) {
    let storing = Arc::clone(storing);
    let dirty = Arc::clone(dirty);
    bindable.on_change(move |_| {
        if !storing.load(Ordering::SeqCst) {
            dirty.store(true, Ordering::SeqCst);
        }
    });
}

fn state_for_mode(mode: WindowMode, window_maximized: bool) -> WindowState {
    match mode {
        WindowMode::Windowed if window_maximized => WindowState::Maximized,
        WindowMode::Windowed => WindowState::Normal,
        WindowMode::Borderless => WindowState::BorderlessFullscreen,
        WindowMode::Fullscreen => WindowState::Fullscreen,
    }
}

/// The mode a state presents as, or `None` for transient states that
/// should not rewrite the user's mode preference.
fn mode_for_state(state: WindowState) -> Option<WindowMode> {
    match state {
        WindowState::Normal | WindowState::Maximized => Some(WindowMode::Windowed),
        WindowState::Fullscreen => Some(WindowMode::Fullscreen),
        WindowState::BorderlessFullscreen => Some(WindowMode::Borderless),
        WindowState::Minimized => None,
    }
}
