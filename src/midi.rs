//! MIDI message parsing
//!
//! Decodes the raw bytes delivered by a MIDI input callback into channel
//! messages. Parsing never allocates, so it is usable from the audio thread
//! when the host hands MIDI events over inside the process callback.

use std::fmt;

/// Channel voice messages understood by the gain unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Parse a channel message from raw bytes.
    ///
    /// System messages (SysEx, clock, active sensing...) and running-status
    /// data are not relevant to gain control and yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status or system message
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note: d1?, velocity: d2? }),
            0x90 => {
                let (note, velocity) = (d1?, d2?);
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xA0 => Some(MidiMessage::PolyPressure { channel, note: d1?, pressure: d2? }),
            0xB0 => Some(MidiMessage::ControlChange { channel, cc: d1?, value: d2? }),
            0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
            0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
            0xE0 => {
                let lsb = d1? as u16;
                let msb = d2? as u16;
                Some(MidiMessage::PitchBend { channel, value: (msb << 7) | lsb })
            }
            _ => None,
        }
    }

    /// Get the channel (0-15)
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change() {
        let data = [0xB2, 7, 100]; // CC ch 3, volume, value 100
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(msg, MidiMessage::ControlChange {
            channel: 2,
            cc: 7,
            value: 100,
        });
        assert_eq!(msg.channel(), 2);
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let data = [0x90, 60, 0]; // Note On with velocity 0 = Note Off
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(msg, MidiMessage::NoteOff {
            channel: 0,
            note: 60,
            velocity: 0,
        });
    }

    #[test]
    fn test_pitch_bend() {
        let data = [0xE0, 0x00, 0x40]; // Pitch Bend ch 1, center (8192)
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(msg, MidiMessage::PitchBend {
            channel: 0,
            value: 8192,
        });
    }

    #[test]
    fn test_data_bytes_are_masked() {
        let msg = MidiMessage::parse(&[0xB0, 0x87, 0xFF]).unwrap();
        assert_eq!(msg, MidiMessage::ControlChange { channel: 0, cc: 7, value: 127 });
    }

    #[test]
    fn test_rejects_truncated_and_system_messages() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0x07, 64]), None); // running status
        assert_eq!(MidiMessage::parse(&[0xF8]), None); // timing clock
        assert_eq!(MidiMessage::parse(&[0xF0, 0x7E, 0xF7]), None);
    }

    #[test]
    fn test_display_uses_one_based_channel() {
        let cc = MidiMessage::parse(&[0xB2, 7, 100]).unwrap();
        assert_eq!(cc.to_string(), "CC ch:3 cc:7 v:100");

        let note = MidiMessage::parse(&[0x9F, 60, 0]).unwrap();
        assert_eq!(note.to_string(), "NoteOff ch:16 n:60 v:0");

        let bend = MidiMessage::parse(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(bend.to_string(), "PitchBend ch:1 v:8192");
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x07, 0x40]), "B0 07 40");
    }
}
