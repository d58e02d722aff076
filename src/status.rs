//! Connection status for the UI
//!
//! Polled on a non-real-time timer. Purely observational: it forwards the
//! device manager's state, remembers the last value so subscribers only hear
//! about changes, and formats the labels the UI shows.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::device::{ConnectionState, DeviceManager};
use crate::dispatch::MidiActivity;

/// Default status poll cadence
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Anything able to report a connection state
pub trait ConnectionSource: Send + Sync {
    fn connection_state(&self) -> ConnectionState;
}

impl ConnectionSource for DeviceManager {
    fn connection_state(&self) -> ConnectionState {
        DeviceManager::connection_state(self)
    }
}

/// RGB colour as `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:06x}", self.0)
    }
}

/// What the status label shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDisplay {
    pub text: &'static str,
    pub color: Rgb,
}

impl StatusDisplay {
    pub fn for_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Self {
                text: "MIDI Controller: Connected",
                color: Rgb(0x88b4b4),
            },
            ConnectionState::Disconnected => Self {
                text: "MIDI Controller: Disconnected",
                color: Rgb(0x85827a),
            },
        }
    }
}

/// Label for the last received control change
pub fn cc_label(activity: &MidiActivity) -> String {
    match activity.last_cc() {
        Some((controller, value)) => format!("MIDI CC: {} Value: {}", controller, value),
        None => "MIDI CC: 0".to_string(),
    }
}

/// Callback invoked when the polled state changes
pub type StatusCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Periodic status forwarder
pub struct StatusPublisher {
    source: Arc<dyn ConnectionSource>,
    last: Mutex<Option<ConnectionState>>,
    callbacks: RwLock<Vec<StatusCallback>>,
}

impl StatusPublisher {
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            source,
            last: Mutex::new(None),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Read the current state, notifying subscribers if it changed
    pub fn poll(&self) -> ConnectionState {
        let state = self.source.connection_state();

        let changed = {
            let mut last = self.last.lock();
            let changed = *last != Some(state);
            *last = Some(state);
            changed
        };

        if changed {
            let status_display = StatusDisplay::for_state(state);
            info!("{} ({})", status_display.text, status_display.color.hex());
            for callback in self.callbacks.read().iter() {
                callback(state);
            }
        }

        state
    }

    /// Display for the most recently polled state
    pub fn display(&self) -> StatusDisplay {
        let state = self.last.lock().unwrap_or(ConnectionState::Disconnected);
        StatusDisplay::for_state(state)
    }

    pub fn subscribe(&self, callback: StatusCallback) {
        debug!("Status publisher: new subscription");
        self.callbacks.write().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        connected: AtomicBool,
    }

    impl ConnectionSource for FakeSource {
        fn connection_state(&self) -> ConnectionState {
            if self.connected.load(Ordering::SeqCst) {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            }
        }
    }

    #[test]
    fn test_poll_forwards_state() {
        let source = Arc::new(FakeSource::default());
        let publisher = StatusPublisher::new(source.clone());

        assert_eq!(publisher.poll(), ConnectionState::Disconnected);

        source.connected.store(true, Ordering::SeqCst);
        assert_eq!(publisher.poll(), ConnectionState::Connected);
        assert_eq!(publisher.display().text, "MIDI Controller: Connected");

        source.connected.store(false, Ordering::SeqCst);
        assert_eq!(publisher.poll(), ConnectionState::Disconnected);
        assert_eq!(publisher.display().color, Rgb(0x85827a));
    }

    #[test]
    fn test_subscribers_hear_changes_only() {
        let source = Arc::new(FakeSource::default());
        let publisher = StatusPublisher::new(source.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        publisher.subscribe(Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        publisher.poll();
        publisher.poll();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        source.connected.store(true, Ordering::SeqCst);
        publisher.poll();
        publisher.poll();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_display_before_first_poll() {
        let publisher = StatusPublisher::new(Arc::new(FakeSource::default()));
        assert_eq!(publisher.display().text, "MIDI Controller: Disconnected");
        assert_eq!(publisher.display().color.hex(), "#85827a");
    }

    #[test]
    fn test_cc_label() {
        let activity = MidiActivity::new();
        assert_eq!(cc_label(&activity), "MIDI CC: 0");
    }
}
