//! Bindable persisted-settings store.
//!
//! Each persisted window field is a [`Bindable`]: a clone-shareable
//! value cell with change notification. Writes are safe from any thread;
//! the shell applies their effects on the next tick of the owning
//! thread. Listeners run synchronously on the writer's thread, so the
//! shipped wiring only flips dirty flags inside them.

use casement_core_state::{ModeRequest, Size, WindowConfig, WindowMode};
use std::sync::{Arc, Mutex};

type Listener<T> = Box<dyn Fn(&T) + Send>;

struct BindableInner<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<Listener<T>>>,
}

/// A thread-safe value cell with change notification.
///
/// Clones share the same cell. A write only notifies when the value
/// actually changes, which keeps echo writes (storing back the value a
/// notification reported) from ping-ponging between bound parties.
///
/// Listeners are invoked while an internal lock is held: a listener must
/// not write to the bindable it observes. Cross-field writes are fine.
pub struct Bindable<T> {
    inner: Arc<BindableInner<T>>,
}

impl<T> Clone for Bindable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq> Bindable<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(BindableInner {
                value: Mutex::new(value),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        match self.inner.value.lock() {
            Ok(value) => value.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the value, notifying listeners when it changed.
    pub fn set(&self, new_value: T) {
        {
            let mut value = match self.inner.value.lock() {
                Ok(value) => value,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *value == new_value {
                return;
            }
            *value = new_value.clone();
        }

        if let Ok(listeners) = self.inner.listeners.lock() {
            for listener in listeners.iter() {
                listener(&new_value);
            }
        }
    }

    /// Register a change listener.
    ///
    /// The listener receives the new value on the thread that wrote it.
    pub fn on_change(&self, listener: impl Fn(&T) + Send + 'static) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(Box::new(listener));
        }
    }
}

/// The bindable view of [`WindowConfig`].
///
/// Constructed from a loaded config at startup; [`snapshot`] turns the
/// live values back into a config for the host to flush to disk.
///
/// [`snapshot`]: WindowSettings::snapshot
#[derive(Clone)]
pub struct WindowSettings {
    /// Fractional horizontal position in `[0, 1]`.
    pub relative_x: Bindable<f64>,
    /// Fractional vertical position in `[0, 1]`.
    pub relative_y: Bindable<f64>,
    /// Windowed-mode client width in pixels.
    pub windowed_width: Bindable<u32>,
    /// Windowed-mode client height in pixels.
    pub windowed_height: Bindable<u32>,
    /// Preferred exclusive-fullscreen width in pixels.
    pub fullscreen_width: Bindable<u32>,
    /// Preferred exclusive-fullscreen height in pixels.
    pub fullscreen_height: Bindable<u32>,
    /// Preferred fullscreen refresh rate in Hz (0 = platform's choice).
    pub refresh_rate: Bindable<u32>,
    /// The display the window lives on.
    pub display_index: Bindable<usize>,
    /// The user-selected window mode.
    pub mode: Bindable<WindowMode>,
}

impl WindowSettings {
    /// Build the bindable store from a persisted config.
    pub fn from_config(config: &WindowConfig) -> Self {
        Self {
            relative_x: Bindable::new(config.relative_x),
            relative_y: Bindable::new(config.relative_y),
            windowed_width: Bindable::new(config.windowed_width),
            windowed_height: Bindable::new(config.windowed_height),
            fullscreen_width: Bindable::new(config.fullscreen_width),
            fullscreen_height: Bindable::new(config.fullscreen_height),
            refresh_rate: Bindable::new(config.refresh_rate),
            display_index: Bindable::new(config.display_index),
            mode: Bindable::new(config.mode),
        }
    }

    /// Snapshot the live values into a persistable config.
    pub fn snapshot(&self) -> WindowConfig {
        WindowConfig {
            relative_x: self.relative_x.get(),
            relative_y: self.relative_y.get(),
            windowed_width: self.windowed_width.get(),
            windowed_height: self.windowed_height.get(),
            fullscreen_width: self.fullscreen_width.get(),
            fullscreen_height: self.fullscreen_height.get(),
            refresh_rate: self.refresh_rate.get(),
            display_index: self.display_index.get(),
            mode: self.mode.get(),
        }
    }

    /// The windowed-mode size.
    pub fn windowed_size(&self) -> Size {
        Size::new(self.windowed_width.get(), self.windowed_height.get())
    }

    /// The fullscreen target as a closest-mode request.
    pub fn fullscreen_request(&self) -> ModeRequest {
        let refresh = self.refresh_rate.get();
        ModeRequest {
            width: self.fullscreen_width.get(),
            height: self.fullscreen_height.get(),
            refresh_rate: if refresh == 0 { None } else { Some(refresh) },
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self::from_config(&WindowConfig::default())
    }
}
