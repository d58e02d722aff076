//! Gain parameter store
//!
//! Single source of truth for the gain value shared by the audio thread,
//! the MIDI callback thread and the UI. The value lives in an `AtomicU32`
//! holding the `f32` bits, so reads are wait-free and never torn.
//!
//! Writers race with last-writer-wins semantics. Host notification and UI
//! listeners only ever run on the writing (non-real-time) thread; writes
//! coming from the audio thread go through [`ParameterStore::write_deferred`]
//! and are announced later by [`ParameterStore::flush_notifications`].
//!
//! Two racing `write` calls can announce their values to the host in the
//! opposite order to their commits, leaving the host one value behind. The
//! periodic flush compares the committed value with the last announced one,
//! so the host catches up on the next tick.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Host-visible identifier of the gain parameter
pub const GAIN_PARAM_ID: &str = "gain";

/// Default gain exposed to the host
pub const DEFAULT_GAIN: f32 = 0.5;

/// Callback informing the host of a parameter change (automation write-back)
pub type HostNotifier = Arc<dyn Fn(f32) + Send + Sync>;

/// Callback informing the UI of a parameter change (slider redraw)
pub type ParameterListener = Arc<dyn Fn(f32) + Send + Sync>;

/// Lock-free gain store
pub struct ParameterStore {
    /// Committed value as `f32` bits, always within [0, 1]
    value: AtomicU32,

    /// Last value the host was told about
    last_notified: AtomicU32,

    host_notifier: RwLock<Option<HostNotifier>>,
    listeners: RwLock<Vec<ParameterListener>>,
}

impl ParameterStore {
    /// Create a store holding `initial` (clamped)
    pub fn new(initial: f32) -> Self {
        let bits = normalize(initial).unwrap_or(DEFAULT_GAIN).to_bits();
        Self {
            value: AtomicU32::new(bits),
            last_notified: AtomicU32::new(bits),
            host_notifier: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Latest committed value.
    ///
    /// Wait-free, allocation-free; safe on the audio thread.
    #[inline]
    pub fn read(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Commit a value from the UI or MIDI thread.
    ///
    /// The value is clamped to [0, 1]; NaN is dropped. When the result differs
    /// from the last value announced to the host, the host notifier and the UI
    /// listeners run on the calling thread.
    pub fn write(&self, value: f32) {
        if let Some(bits) = self.commit(value) {
            self.notify_if_changed(bits);
        }
    }

    /// Commit a value from the audio thread.
    ///
    /// Never calls out: the notification is left to
    /// [`flush_notifications`](Self::flush_notifications).
    #[inline]
    pub fn write_deferred(&self, value: f32) {
        self.commit(value);
    }

    /// Commit a value automated by the host.
    ///
    /// UI listeners are informed, the host is not (it already knows).
    pub fn set_from_host(&self, value: f32) {
        let Some(bits) = self.commit(value) else {
            return;
        };
        let previous = self.last_notified.swap(bits, Ordering::AcqRel);
        if previous != bits {
            trace!("Host automation: {} = {:.4}", GAIN_PARAM_ID, f32::from_bits(bits));
            self.notify_listeners(f32::from_bits(bits));
        }
    }

    /// Announce the committed value if the host has not heard it yet.
    ///
    /// Covers [`write_deferred`](Self::write_deferred) and racing writers.
    /// Called periodically from a non-real-time timer.
    pub fn flush_notifications(&self) {
        self.notify_if_changed(self.value.load(Ordering::Acquire));
    }

    /// Install the host notifier, replacing any previous one
    pub fn set_host_notifier(&self, notifier: HostNotifier) {
        *self.host_notifier.write() = Some(notifier);
    }

    /// Register a UI listener
    pub fn subscribe(&self, listener: ParameterListener) {
        debug!("Parameter '{}': new listener subscription", GAIN_PARAM_ID);
        self.listeners.write().push(listener);
    }

    fn commit(&self, value: f32) -> Option<u32> {
        let bits = normalize(value)?.to_bits();
        self.value.store(bits, Ordering::Release);
        Some(bits)
    }

    fn notify_if_changed(&self, bits: u32) {
        let previous = self.last_notified.swap(bits, Ordering::AcqRel);
        if previous == bits {
            return;
        }

        let value = f32::from_bits(bits);
        trace!("Parameter '{}' changed: {:.4}", GAIN_PARAM_ID, value);

        let notifier = self.host_notifier.read().clone();
        if let Some(notifier) = notifier {
            notifier(value);
        }
        self.notify_listeners(value);
    }

    fn notify_listeners(&self, value: f32) {
        for listener in self.listeners.read().iter() {
            listener(value);
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN)
    }
}

/// Clamp to [0, 1], folding -0.0 into 0.0. NaN has no meaningful position.
fn normalize(value: f32) -> Option<f32> {
    if value.is_nan() {
        return None;
    }
    let clamped = value.clamp(0.0, 1.0);
    Some(if clamped == 0.0 { 0.0 } else { clamped })
}
