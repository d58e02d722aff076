//! MIDI input device management
//!
//! Keeps at most one MIDI input open and follows hot-plug by polling the
//! endpoint list on a fixed interval. Platform MIDI APIs do not reliably
//! report device arrival/removal, so enumeration is the source of truth.
//!
//! ## States
//! - **NoDevice**: nothing open, status is Disconnected.
//! - **DeviceAttached**: one connection open, its callback feeds
//!   [`MidiDispatch`], status is Connected.
//!
//! Every refresh picks the first eligible endpoint. Same id as the attached
//! one: nothing happens. Different id: the old connection is closed before
//! the new one is opened. No eligible endpoint: the connection is closed.
//! A failed open leaves the manager in NoDevice until the next tick.

pub mod midir_backend;

#[cfg(test)]
pub(crate) mod mock;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dispatch::MidiDispatch;

pub use midir_backend::MidirBackend;

/// Default device refresh cadence
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Callback receiving raw bytes of each incoming MIDI message
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A discoverable MIDI input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEndpoint {
    /// Backend-specific stable identifier
    pub id: String,
    /// Human-readable port name
    pub name: String,
}

impl MidiEndpoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MidiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}

/// Connection state shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Errors raised by a MIDI backend
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to initialise MIDI input: {0}")]
    Init(String),

    #[error("MIDI input '{0}' is no longer available")]
    NotFound(String),

    #[error("failed to open MIDI input '{name}': {reason}")]
    Open { name: String, reason: String },
}

/// An open input. Closing it deregisters the message callback.
pub trait InputConnection: Send {
    fn close(self: Box<Self>);
}

/// Platform MIDI input access
pub trait MidiInputBackend: Send + Sync {
    /// List the currently available inputs
    fn enumerate(&self) -> Result<Vec<MidiEndpoint>, DeviceError>;

    /// Open `endpoint` and deliver its messages to `handler`.
    ///
    /// The handler must not be invoked concurrently with itself, nor after
    /// the returned connection has been closed.
    fn open(
        &self,
        endpoint: &MidiEndpoint,
        handler: MessageHandler,
    ) -> Result<Box<dyn InputConnection>, DeviceError>;
}

/// Result of a single refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same device as before, or still no device
    Unchanged,
    Attached(MidiEndpoint),
    Detached(MidiEndpoint),
    Switched { from: MidiEndpoint, to: MidiEndpoint },
    /// The endpoint was listed but could not be opened
    OpenFailed(MidiEndpoint),
}

struct Attached {
    endpoint: MidiEndpoint,
    connection: Box<dyn InputConnection>,
}

/// Owns the (single) open MIDI input
pub struct DeviceManager {
    backend: Arc<dyn MidiInputBackend>,
    dispatch: Arc<MidiDispatch>,

    /// Case-insensitive name substring an endpoint must contain
    name_filter: Option<String>,

    /// Attached device, doubling as the last connected endpoint id
    attached: Mutex<Option<Attached>>,

    /// Mirror of `attached.is_some()`, readable without locking
    connected: AtomicBool,
    shutdown_flag: AtomicBool,
}

impl DeviceManager {
    pub fn new(backend: Arc<dyn MidiInputBackend>, dispatch: Arc<MidiDispatch>) -> Self {
        Self {
            backend,
            dispatch,
            name_filter: None,
            attached: Mutex::new(None),
            connected: AtomicBool::new(false),
            shutdown_flag: AtomicBool::new(false),
        }
    }

    /// Only consider endpoints whose name contains `filter` (case-insensitive)
    pub fn with_name_filter(mut self, filter: Option<String>) -> Self {
        self.name_filter = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        self
    }

    pub fn dispatch(&self) -> &Arc<MidiDispatch> {
        &self.dispatch
    }

    /// Whether an input is currently attached
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Endpoint currently attached, if any
    pub fn attached_endpoint(&self) -> Option<MidiEndpoint> {
        self.attached.lock().as_ref().map(|a| a.endpoint.clone())
    }

    /// List inputs, marking which are eligible for attachment
    pub fn list_endpoints(&self) -> Result<Vec<(MidiEndpoint, bool)>, DeviceError> {
        Ok(self
            .backend
            .enumerate()?
            .into_iter()
            .map(|ep| {
                let eligible = self.is_eligible(&ep);
                (ep, eligible)
            })
            .collect())
    }

    /// Re-enumerate inputs and attach, keep, switch or detach accordingly.
    pub fn refresh(&self) -> Transition {
        let mut attached = self.attached.lock();

        if self.shutdown_flag.load(Ordering::Acquire) {
            return Transition::Unchanged;
        }

        let endpoints = match self.backend.enumerate() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!("MIDI enumeration failed (treated as no device): {}", e);
                Vec::new()
            }
        };
        debug!("Found {} MIDI input ports", endpoints.len());

        let target = endpoints.into_iter().find(|ep| self.is_eligible(ep));
        let current_id = attached.as_ref().map(|a| a.endpoint.id.clone());

        let transition = match (current_id, target) {
            (None, None) => Transition::Unchanged,
            (Some(id), Some(target)) if id == target.id => Transition::Unchanged,
            (Some(_), None) => match Self::detach(&mut attached) {
                Some(previous) => {
                    info!("MIDI controller disconnected: {}", previous.name);
                    Transition::Detached(previous)
                }
                None => Transition::Unchanged,
            },
            (None, Some(target)) => {
                if self.attach(&mut attached, target.clone()) {
                    Transition::Attached(target)
                } else {
                    Transition::OpenFailed(target)
                }
            }
            (Some(_), Some(target)) => {
                let previous = Self::detach(&mut attached);
                match (previous, self.attach(&mut attached, target.clone())) {
                    (Some(from), true) => {
                        info!("MIDI controller switched: {} -> {}", from.name, target.name);
                        Transition::Switched { from, to: target }
                    }
                    (None, true) => Transition::Attached(target),
                    (_, false) => Transition::OpenFailed(target),
                }
            }
        };

        self.connected.store(attached.is_some(), Ordering::Release);
        transition
    }

    /// Close the attached input and stop accepting refreshes.
    ///
    /// The connection is closed here, before the manager goes away, so no
    /// callback can outlive it.
    pub fn shutdown(&self) {
        debug!("Shutting down MIDI device manager");
        self.shutdown_flag.store(true, Ordering::Release);

        let mut attached = self.attached.lock();
        if let Some(previous) = Self::detach(&mut attached) {
            info!("MIDI controller released: {}", previous.name);
        }
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }

    /// Refresh every `interval` on the tokio runtime until shutdown.
    ///
    /// The first refresh happens immediately. The task only holds a weak
    /// reference, so dropping the last `Arc` also ends polling.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        debug!("Polling MIDI inputs every {:?}", interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if manager.is_shut_down() {
                    break;
                }
                manager.refresh();
            }

            debug!("MIDI device polling stopped");
        })
    }

    fn is_eligible(&self, endpoint: &MidiEndpoint) -> bool {
        match &self.name_filter {
            Some(filter) => endpoint.name.to_lowercase().contains(filter),
            None => true,
        }
    }

    /// Open `endpoint` into `slot`; false when the open failed
    fn attach(&self, slot: &mut Option<Attached>, endpoint: MidiEndpoint) -> bool {
        debug_assert!(slot.is_none(), "attach over a live connection");

        let dispatch = self.dispatch.clone();
        let handler: MessageHandler = Arc::new(move |data: &[u8]| {
            dispatch.handle(data);
        });

        match self.backend.open(&endpoint, handler) {
            Ok(connection) => {
                info!("MIDI controller connected: {}", endpoint.name);
                *slot = Some(Attached { endpoint, connection });
                true
            }
            Err(e) => {
                warn!("{} (retrying on next poll)", e);
                false
            }
        }
    }

    fn detach(slot: &mut Option<Attached>) -> Option<MidiEndpoint> {
        let Attached { endpoint, connection } = slot.take()?;
        connection.close();
        debug!("MIDI input closed: {}", endpoint);
        Some(endpoint)
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        Self::detach(self.attached.get_mut());
    }
}
