//! MIDI Gain
//!
//! A gain unit whose single parameter is shared by the host (automation),
//! a UI and a hot-pluggable MIDI controller sending CC 7.
//!
//! - [`parameter`]: lock-free gain store
//! - [`cc_mapper`]: CC 7 to normalized gain
//! - [`device`]: MIDI input hot-plug handling
//! - [`audio`]: real-time block processing
//! - [`status`]: connection status for the UI
//! - [`unit`]: everything wired together

pub mod audio;
pub mod cc_mapper;
pub mod cli;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod midi;
pub mod parameter;
pub mod status;
pub mod unit;

pub use device::{ConnectionState, DeviceManager};
pub use parameter::ParameterStore;
pub use unit::GainUnit;
