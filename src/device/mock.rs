//! In-memory MIDI backend for tests

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use super::{DeviceError, InputConnection, MessageHandler, MidiEndpoint, MidiInputBackend};

#[derive(Default)]
struct MockState {
    endpoints: Vec<MidiEndpoint>,
    failing: HashSet<String>,
    enumerate_fails: bool,
    open_calls: usize,
    live: usize,
    max_live: usize,
    handler: Option<MessageHandler>,
}

/// In-memory MIDI backend whose endpoint list the test edits
#[derive(Clone, Default)]
pub(crate) struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn plug(&self, id: &str, name: &str) {
        self.state.lock().endpoints.push(MidiEndpoint::new(id, name));
    }

    pub fn plug_first(&self, id: &str, name: &str) {
        self.state.lock().endpoints.insert(0, MidiEndpoint::new(id, name));
    }

    pub fn unplug(&self, id: &str) {
        self.state.lock().endpoints.retain(|ep| ep.id != id);
    }

    pub fn fail_open(&self, id: &str, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.failing.insert(id.to_string());
        } else {
            state.failing.remove(id);
        }
    }

    pub fn set_enumerate_fails(&self, fail: bool) {
        self.state.lock().enumerate_fails = fail;
    }

    /// Deliver bytes as the platform MIDI thread would
    pub fn send(&self, data: &[u8]) -> bool {
        let handler = self.state.lock().handler.clone();
        match handler {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().max_live
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl InputConnection for MockConnection {
    fn close(self: Box<Self>) {
        let mut state = self.state.lock();
        state.live -= 1;
        state.handler = None;
    }
}

impl MidiInputBackend for MockBackend {
    fn enumerate(&self) -> Result<Vec<MidiEndpoint>, DeviceError> {
        let state = self.state.lock();
        if state.enumerate_fails {
            return Err(DeviceError::Init("mock failure".to_string()));
        }
        Ok(state.endpoints.clone())
    }

    fn open(
        &self,
        endpoint: &MidiEndpoint,
        handler: MessageHandler,
    ) -> Result<Box<dyn InputConnection>, DeviceError> {
        let mut state = self.state.lock();
        state.open_calls += 1;

        if state.failing.contains(&endpoint.id) {
            return Err(DeviceError::NotFound(endpoint.name.clone()));
        }

        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.handler = Some(handler);

        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}
