//! `midir` implementation of the MIDI input backend

use midir::{MidiInput, MidiInputConnection};
use tracing::debug;

use super::{DeviceError, InputConnection, MessageHandler, MidiEndpoint, MidiInputBackend};

/// Virtual/loopback port name markers
const VIRTUAL_MARKERS: [&str; 3] = ["Virtual", "loopMIDI", "IAC"];

/// Platform MIDI inputs through `midir`
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn midi_input(&self, role: &str) -> Result<MidiInput, DeviceError> {
        MidiInput::new(&format!("{}-{}", self.client_name, role))
            .map_err(|e| DeviceError::Init(e.to_string()))
    }
}

/// Whether a port name looks like a software loopback
pub fn is_virtual_port(name: &str) -> bool {
    VIRTUAL_MARKERS.iter().any(|marker| name.contains(marker))
}

impl MidiInputBackend for MidirBackend {
    fn enumerate(&self) -> Result<Vec<MidiEndpoint>, DeviceError> {
        let midi_in = self.midi_input("Scanner")?;

        let mut endpoints = Vec::new();
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                endpoints.push(MidiEndpoint { id: port.id(), name });
            }
        }

        Ok(endpoints)
    }

    fn open(
        &self,
        endpoint: &MidiEndpoint,
        handler: MessageHandler,
    ) -> Result<Box<dyn InputConnection>, DeviceError> {
        let midi_in = self.midi_input("Input")?;

        // The port may have vanished since enumeration
        let port = midi_in
            .find_port_by_id(endpoint.id.clone())
            .ok_or_else(|| DeviceError::NotFound(endpoint.name.clone()))?;

        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| handler(data),
                (),
            )
            .map_err(|e| DeviceError::Open {
                name: endpoint.name.clone(),
                reason: e.to_string(),
            })?;

        debug!("MIDI input opened: {}", endpoint);
        Ok(Box::new(MidirConnection(connection)))
    }
}

struct MidirConnection(MidiInputConnection<()>);

impl InputConnection for MidirConnection {
    fn close(self: Box<Self>) {
        let (_midi_in, ()) = self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_port_detection() {
        assert!(is_virtual_port("loopMIDI Port 1"));
        assert!(is_virtual_port("IAC Driver Bus 1"));
        assert!(!is_virtual_port("Arduino Micro"));
    }

    #[test]
    fn test_port_enumeration() {
        // Only checks enumeration does not panic; CI machines may lack MIDI
        let _ = MidirBackend::new("MIDI-Gain-Test").enumerate();
    }
}
