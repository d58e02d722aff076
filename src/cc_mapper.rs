//! MIDI CC to gain mapping

use crate::midi::MidiMessage;

/// Controller number that drives the gain (MIDI "channel volume")
pub const GAIN_CC: u8 = 7;

/// Largest 7-bit controller value
const CC_MAX: f32 = 127.0;

/// A control change as seen by the mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcMessage {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Controller number (0-127)
    pub controller: u8,
    /// Controller value (0-127)
    pub value: u8,
}

impl CcMessage {
    pub fn new(controller: u8, value: u8) -> Self {
        Self { channel: 0, controller, value }
    }

    /// Extract a control change from a parsed MIDI message
    pub fn from_message(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::ControlChange { channel, cc, value } => Some(Self {
                channel,
                controller: cc,
                value,
            }),
            _ => None,
        }
    }
}

/// Map a control change to a normalized gain.
///
/// Only [`GAIN_CC`] produces a value: `value / 127`, so 0 maps to 0.0 and
/// 127 to 1.0. Every other controller is ignored.
pub fn map_to_gain(message: CcMessage) -> Option<f32> {
    if message.controller != GAIN_CC {
        return None;
    }
    Some(f32::from(message.value.min(127)) / CC_MAX)
}
