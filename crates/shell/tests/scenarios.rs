//! End-to-end scenarios for the window shell.
//!
//! These tests drive a [`WindowController`] over the headless backend
//! and verify:
//! - State transitions reach their target and fire one event each
//! - Fullscreen targets degrade gracefully on limited displays
//! - Window placement survives mode round trips via the settings store
//! - Display mode resolution tries its fallback tiers in order
//! - Cross-thread request staging

use casement_core_state::{
    DisplayIndex, DisplayMode, ModeRequest, Point, Rect, Size, WindowConfig, WindowFlags,
    WindowMode, WindowState,
};
use casement_platform::{
    HeadlessDisplay, HeadlessPlatform, PlatformError, PlatformWindow, RawWindowEvent,
    WindowDescriptor,
};
use casement_shell::{resolve_display_mode, WindowController, WindowEvent};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn controller(config: WindowConfig) -> WindowController {
    WindowController::new(Box::new(HeadlessPlatform::new()), &config, "scenario").unwrap()
}

fn record_state_changes(controller: &mut WindowController) -> Rc<RefCell<Vec<WindowState>>> {
    let states = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&states);
    controller.on_event(move |event| {
        if let WindowEvent::StateChanged(state) = event {
            sink.borrow_mut().push(*state);
        }
    });
    states
}

// ============================================================================
// State Transition Scenarios
// ============================================================================

/// A staged fullscreen request applies the persisted 1920x1080@60
/// target: the drawable follows the resolved mode and exactly one state
/// change fires.
#[test]
fn test_fullscreen_request_applies_the_persisted_target() {
    let config = WindowConfig {
        windowed_width: 800,
        windowed_height: 600,
        refresh_rate: 60,
        ..WindowConfig::default()
    };
    let mut controller = controller(config);
    let states = record_state_changes(&mut controller);

    controller.request_state(WindowState::Fullscreen);
    controller.tick().unwrap();
    controller.tick().unwrap();

    assert_eq!(controller.state(), WindowState::Fullscreen);
    assert_eq!(controller.size(), Size::new(1920, 1080));
    assert_eq!(*states.borrow(), vec![WindowState::Fullscreen]);
}

/// A 2560x1440@144 target on a display that tops out at 1080p60 lands
/// on the display's native mode instead of failing.
#[test]
fn test_oversized_fullscreen_target_degrades_to_the_display() {
    let config = WindowConfig {
        fullscreen_width: 2560,
        fullscreen_height: 1440,
        refresh_rate: 144,
        ..WindowConfig::default()
    };
    let mut controller = controller(config);

    controller.request_state(WindowState::Fullscreen);
    controller.tick().unwrap();

    assert_eq!(controller.state(), WindowState::Fullscreen);
    assert_eq!(controller.size(), Size::new(1920, 1080));
    let effective = controller.effective_display_mode().unwrap();
    assert_eq!(effective.size(), Size::new(1920, 1080));
    assert_eq!(effective.refresh_rate, 60);
}

/// Cycling on a backend that only supports windowed mode terminates
/// without staging anything.
#[test]
fn test_mode_cycle_terminates_when_only_windowed_is_supported() {
    let mut platform = HeadlessPlatform::new();
    platform.set_supported_modes(vec![WindowMode::Windowed]);
    let mut controller =
        WindowController::new(Box::new(platform), &WindowConfig::default(), "scenario").unwrap();
    let states = record_state_changes(&mut controller);

    controller.cycle_mode();
    controller.tick().unwrap();

    assert_eq!(controller.mode(), WindowMode::Windowed);
    assert_eq!(controller.state(), WindowState::Normal);
    assert!(states.borrow().is_empty());
}

/// Touring every state fires exactly one event per transition, in
/// order.
#[test]
fn test_full_mode_tour_fires_one_event_per_transition() {
    let mut controller = controller(WindowConfig::default());
    let states = record_state_changes(&mut controller);

    for target in [
        WindowState::Maximized,
        WindowState::Fullscreen,
        WindowState::BorderlessFullscreen,
        WindowState::Minimized,
        WindowState::Normal,
    ] {
        controller.request_state(target);
        controller.tick().unwrap();
        assert_eq!(controller.state(), target);
    }

    assert_eq!(
        *states.borrow(),
        vec![
            WindowState::Maximized,
            WindowState::Fullscreen,
            WindowState::BorderlessFullscreen,
            WindowState::Minimized,
            WindowState::Normal,
        ]
    );
}

// ============================================================================
// Placement Persistence
// ============================================================================

/// Persisted center fractions restore to the expected absolute position
/// on a display whose origin is not (0,0).
#[test]
fn test_persisted_fractions_restore_on_an_offset_display() {
    let platform = HeadlessPlatform::with_displays(vec![HeadlessDisplay::new(
        "Offset",
        Rect::new(100, 100, 1920, 1080),
        &[(1920, 1080, 60)],
    )]);
    let config = WindowConfig {
        windowed_width: 800,
        windowed_height: 600,
        ..WindowConfig::default()
    };
    let controller = WindowController::new(Box::new(platform), &config, "scenario").unwrap();

    // (1920-800)*0.5 + 100, (1080-600)*0.5 + 100
    assert_eq!(controller.position(), Point::new(660, 340));
}

/// A user drag is stored as fractions and survives a fullscreen round
/// trip back to the same absolute position.
#[test]
fn test_window_placement_survives_a_fullscreen_round_trip() {
    let mut controller = controller(WindowConfig::default());

    controller.proxy().schedule(|platform| {
        let _ = platform.set_position(Point::new(500, 300));
    });
    controller.tick().unwrap();
    assert!((controller.settings().relative_x.get() - 500.0 / 640.0).abs() < 1e-9);

    controller.request_state(WindowState::Fullscreen);
    controller.tick().unwrap();
    assert_eq!(controller.state(), WindowState::Fullscreen);

    controller.settings().mode.set(WindowMode::Windowed);
    controller.tick().unwrap();

    assert_eq!(controller.state(), WindowState::Normal);
    assert_eq!(controller.position(), Point::new(500, 300));
}

/// A user resize writes the settings store exactly once per changed
/// field; the programmatic write must not loop back into a second
/// store.
#[test]
fn test_size_store_writes_exactly_once() {
    let mut controller = controller(WindowConfig::default());
    let writes = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&writes);
    controller.settings().windowed_width.on_change(move |_| {
        observed.fetch_add(1, Ordering::SeqCst);
    });

    controller.proxy().schedule(|platform| {
        let _ = platform.set_size(Size::new(1000, 700));
    });
    controller.tick().unwrap();
    controller.tick().unwrap();

    assert_eq!(controller.settings().windowed_width.get(), 1000);
    assert_eq!(controller.settings().windowed_height.get(), 700);
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

/// Edits to the settings store from outside the controller move the
/// live window on the next tick.
#[test]
fn test_external_settings_edit_moves_the_window() {
    let mut controller = controller(WindowConfig::default());

    controller.settings().relative_x.set(0.0);
    controller.settings().relative_y.set(0.0);
    controller.tick().unwrap();
    controller.tick().unwrap();

    assert_eq!(controller.position(), Point::new(0, 0));
}

/// An edit made while the window is minimized is not lost: it applies
/// once the window is windowed again, even when the restore happens
/// behind the controller's back instead of through a staged request.
#[test]
fn test_settings_edit_survives_external_restore() {
    let mut controller = controller(WindowConfig::default());
    controller.request_state(WindowState::Minimized);
    controller.tick().unwrap();
    assert_eq!(controller.state(), WindowState::Minimized);

    controller.settings().windowed_width.set(1000);
    controller.settings().windowed_height.set(700);
    controller.tick().unwrap();

    controller.proxy().schedule(|platform| {
        let _ = platform.restore();
    });
    for _ in 0..3 {
        controller.tick().unwrap();
    }

    assert_eq!(controller.state(), WindowState::Normal);
    assert_eq!(controller.size(), Size::new(1000, 700));
    assert_eq!(controller.settings().windowed_width.get(), 1000);
}

// ============================================================================
// Display Mode Resolution Order
// ============================================================================

/// Minimal platform that rejects requested-mode queries, accepts the
/// native-bounds retry, and records whether the last-resort tier was
/// ever reached.
struct TierProbe {
    native: Rect,
    tier3_hits: Cell<u32>,
}

impl TierProbe {
    fn native_mode(&self) -> DisplayMode {
        DisplayMode {
            width: self.native.width as u32,
            height: self.native.height as u32,
            refresh_rate: 60,
            pixel_format: Default::default(),
            display_index: 0,
        }
    }
}

impl PlatformWindow for TierProbe {
    fn create(&mut self, _: &WindowDescriptor) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn destroy(&mut self) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn is_created(&self) -> bool {
        true
    }
    fn set_title(&mut self, _: &str) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_position(&mut self, _: Point) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_size(&mut self, _: Size) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_resizable(&mut self, _: bool) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_visible(&mut self, _: bool) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_fullscreen_mode(&mut self, _: Option<&DisplayMode>) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_desktop_fullscreen(&mut self, _: bool) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn set_bordered(&mut self, _: bool) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn maximize(&mut self) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn minimize(&mut self) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn restore(&mut self) -> Result<(), PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn window_flags(&self) -> Result<WindowFlags, PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn drawable_size(&self) -> Result<Size, PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn window_size(&self) -> Result<Size, PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn window_position(&self) -> Result<Point, PlatformError> {
        unimplemented!("not used by the resolver")
    }
    fn display_count(&self) -> Result<usize, PlatformError> {
        Ok(1)
    }
    fn display_name(&self, _: DisplayIndex) -> Result<String, PlatformError> {
        Ok("probe".to_string())
    }
    fn display_bounds(&self, _: DisplayIndex) -> Result<Rect, PlatformError> {
        Ok(self.native)
    }
    fn display_modes(&self, _: DisplayIndex) -> Result<Vec<DisplayMode>, PlatformError> {
        Ok(vec![self.native_mode()])
    }
    fn closest_display_mode(
        &self,
        _: DisplayIndex,
        request: &ModeRequest,
    ) -> Result<Option<DisplayMode>, PlatformError> {
        let native = request.refresh_rate.is_none()
            && request.width == self.native.width as u32
            && request.height == self.native.height as u32;
        Ok(if native { Some(self.native_mode()) } else { None })
    }
    fn current_display_mode(&self, _: DisplayIndex) -> Result<DisplayMode, PlatformError> {
        self.tier3_hits.set(self.tier3_hits.get() + 1);
        Ok(self.native_mode())
    }
    fn window_display_mode(&self) -> Result<DisplayMode, PlatformError> {
        self.tier3_hits.set(self.tier3_hits.get() + 1);
        Ok(self.native_mode())
    }
    fn window_display_index(&self) -> Result<DisplayIndex, PlatformError> {
        Ok(0)
    }
    fn supported_window_modes(&self) -> Vec<WindowMode> {
        vec![WindowMode::Windowed]
    }
    fn poll_events(&mut self) -> Vec<RawWindowEvent> {
        Vec::new()
    }
}

/// When the requested mode has no match, the resolver must succeed at
/// the native-bounds tier and never reach the current-mode tier.
#[test]
fn test_resolver_prefers_native_bounds_before_current_mode() {
    let probe = TierProbe {
        native: Rect::new(0, 0, 1920, 1080),
        tier3_hits: Cell::new(0),
    };

    let mode = resolve_display_mode(&probe, 0, &ModeRequest::with_refresh(2560, 1440, 144))
        .unwrap();

    assert_eq!(mode.size(), Size::new(1920, 1080));
    assert_eq!(probe.tier3_hits.get(), 0, "tier 3 must not be attempted");
}

// ============================================================================
// Cross-Thread Usage
// ============================================================================

/// Requests staged and commands scheduled from another thread apply on
/// the owning thread's next tick.
#[test]
fn test_proxy_drives_the_window_from_another_thread() {
    let mut controller = controller(WindowConfig::default());
    let proxy = controller.proxy();

    std::thread::spawn(move || {
        proxy.schedule(|platform| {
            let _ = platform.set_position(Point::new(40, 40));
        });
        proxy.request_state(WindowState::Maximized);
    })
    .join()
    .unwrap();

    controller.tick().unwrap();
    assert_eq!(controller.state(), WindowState::Maximized);
}
