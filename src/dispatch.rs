//! Incoming MIDI to gain parameter handoff
//!
//! One message in, at most one parameter write out. There is no queue:
//! parsing and mapping are O(1) and allocation-free.

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::cc_mapper::{map_to_gain, CcMessage};
use crate::midi::{format_hex, MidiMessage};
use crate::parameter::ParameterStore;

const NO_CC: u16 = u16::MAX;

/// Last control change seen on any input, for the UI's CC label
#[derive(Debug)]
pub struct MidiActivity {
    /// `controller << 8 | value`, or `NO_CC`
    last_cc: AtomicU16,
    received: AtomicU64,
}

impl MidiActivity {
    pub fn new() -> Self {
        Self {
            last_cc: AtomicU16::new(NO_CC),
            received: AtomicU64::new(0),
        }
    }

    fn record(&self, cc: CcMessage) {
        let packed = (u16::from(cc.controller) << 8) | u16::from(cc.value);
        self.last_cc.store(packed, Ordering::Relaxed);
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Last (controller, value) pair received
    pub fn last_cc(&self) -> Option<(u8, u8)> {
        match self.last_cc.load(Ordering::Relaxed) {
            NO_CC => None,
            packed => Some(((packed >> 8) as u8, (packed & 0xFF) as u8)),
        }
    }

    /// Number of control changes received
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl Default for MidiActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes raw MIDI bytes to the gain parameter
pub struct MidiDispatch {
    store: Arc<ParameterStore>,
    activity: Arc<MidiActivity>,
    /// Accepted channel (0-15), `None` for omni
    channel: Option<u8>,
}

impl MidiDispatch {
    pub fn new(store: Arc<ParameterStore>, channel: Option<u8>) -> Self {
        Self {
            store,
            activity: Arc::new(MidiActivity::new()),
            channel,
        }
    }

    pub fn activity(&self) -> &Arc<MidiActivity> {
        &self.activity
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Handle a message from the MIDI input thread.
    ///
    /// Returns the gain written, if any.
    pub fn handle(&self, data: &[u8]) -> Option<f32> {
        let Some(message) = MidiMessage::parse(data) else {
            trace!("MIDI RX {} (unparsed)", format_hex(data));
            return None;
        };
        let gain = self.accept(message);
        match gain {
            Some(gain) => {
                trace!("MIDI RX {} -> gain {:.4}", message, gain);
                self.store.write(gain);
            }
            None => trace!("MIDI RX {} (ignored)", message),
        }
        gain
    }

    /// Handle a message handed over by the host inside the audio callback.
    ///
    /// Does not log and does not notify; see [`ParameterStore::write_deferred`].
    #[inline]
    pub fn handle_realtime(&self, data: &[u8]) -> Option<f32> {
        let gain = self.accept(MidiMessage::parse(data)?)?;
        self.store.write_deferred(gain);
        Some(gain)
    }

    fn accept(&self, message: MidiMessage) -> Option<f32> {
        if self.channel.is_some_and(|ch| ch != message.channel()) {
            return None;
        }
        let cc = CcMessage::from_message(&message)?;
        self.activity.record(cc);
        map_to_gain(cc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn make_dispatch(channel: Option<u8>) -> MidiDispatch {
        MidiDispatch::new(Arc::new(ParameterStore::new(0.5)), channel)
    }

    #[test]
    fn test_volume_cc_sets_gain() {
        let dispatch = make_dispatch(None);

        assert_eq!(dispatch.handle(&[0xB0, 7, 127]), Some(1.0));
        assert_eq!(dispatch.store().read(), 1.0);

        assert_eq!(dispatch.handle(&[0xB5, 7, 0]), Some(0.0));
        assert_eq!(dispatch.store().read(), 0.0);
    }

    #[test]
    fn test_other_messages_leave_gain_alone() {
        let dispatch = make_dispatch(None);

        assert_eq!(dispatch.handle(&[0xB0, 1, 127]), None); // mod wheel
        assert_eq!(dispatch.handle(&[0x90, 7, 127]), None); // note on
        assert_eq!(dispatch.handle(&[0xF8]), None);
        assert_eq!(dispatch.store().read(), 0.5);
    }

    #[test]
    fn test_activity_tracks_every_cc() {
        let dispatch = make_dispatch(None);
        assert_eq!(dispatch.activity().last_cc(), None);

        dispatch.handle(&[0xB0, 7, 64]);
        dispatch.handle(&[0xB0, 10, 3]);

        assert_eq!(dispatch.activity().last_cc(), Some((10, 3)));
        assert_eq!(dispatch.activity().received(), 2);
    }

    #[test]
    fn test_channel_filter() {
        let dispatch = make_dispatch(Some(1));

        assert_eq!(dispatch.handle(&[0xB0, 7, 127]), None);
        assert_eq!(dispatch.store().read(), 0.5);

        assert_eq!(dispatch.handle(&[0xB1, 7, 127]), Some(1.0));
        assert_eq!(dispatch.store().read(), 1.0);
    }

    #[test]
    fn test_realtime_path_defers_notification() {
        let dispatch = make_dispatch(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        dispatch.store().set_host_notifier(Arc::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(dispatch.handle_realtime(&[0xB0, 7, 0]), Some(0.0));
        assert_eq!(dispatch.store().read(), 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatch.store().flush_notifications();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
