//! The gain unit: parameter, engine, MIDI device and status wired together
//!
//! This is what a plugin wrapper or a standalone host holds on to. The
//! audio thread only calls [`GainUnit::process_block`]; everything else runs
//! on the control side.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audio::AudioEngine;
use crate::config::{AppConfig, TimingConfig};
use crate::device::{DeviceManager, MidiInputBackend, Transition};
use crate::dispatch::MidiDispatch;
use crate::parameter::ParameterStore;
use crate::status::StatusPublisher;

/// Handles of the control-side timers
pub struct BackgroundTasks {
    device: JoinHandle<()>,
    status: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Wait for both timers to finish (after [`GainUnit::shutdown`])
    pub async fn join(self) {
        let _ = self.device.await;
        let _ = self.status.await;
    }
}

pub struct GainUnit {
    params: Arc<ParameterStore>,
    engine: AudioEngine,
    devices: Arc<DeviceManager>,
    status: Arc<StatusPublisher>,
    timing: TimingConfig,
}

impl GainUnit {
    pub fn new(config: &AppConfig, backend: Arc<dyn MidiInputBackend>) -> Self {
        let params = Arc::new(ParameterStore::new(config.gain.default));
        let dispatch = Arc::new(MidiDispatch::new(params.clone(), config.midi.channel_index()));
        let devices = Arc::new(
            DeviceManager::new(backend, dispatch)
                .with_name_filter(config.midi.device_filter.clone()),
        );
        let status = Arc::new(StatusPublisher::new(devices.clone()));

        Self {
            engine: AudioEngine::new(params.clone()),
            params,
            devices,
            status,
            timing: config.timing.clone(),
        }
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    pub fn status(&self) -> &Arc<StatusPublisher> {
        &self.status
    }

    /// Re-scan MIDI inputs before playback starts
    pub fn prepare(&self) -> Transition {
        debug!("Preparing gain unit");
        self.devices.refresh()
    }

    /// Audio callback.
    ///
    /// `host_midi` holds the MIDI events the host delivered with this block;
    /// they take effect before the gain is read. Real-time safe.
    pub fn process_block(
        &self,
        channels: &mut [&mut [f32]],
        num_input_channels: usize,
        num_samples: usize,
        host_midi: &[&[u8]],
    ) {
        let dispatch = self.devices.dispatch();
        for message in host_midi {
            dispatch.handle_realtime(message);
        }
        self.engine.process(channels, num_input_channels, num_samples);
    }

    /// Start device polling and the status timer on the tokio runtime.
    ///
    /// The status tick also flushes host notifications owed by writes made
    /// on the audio thread.
    pub fn start(&self) -> BackgroundTasks {
        info!(
            "Starting MIDI polling every {:?}, status every {:?}",
            self.timing.device_refresh(),
            self.timing.status_poll()
        );

        let device = self.devices.spawn_polling(self.timing.device_refresh());

        let publisher = self.status.clone();
        let params = self.params.clone();
        let devices = Arc::downgrade(&self.devices);
        let period = self.timing.status_poll();

        let status = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match devices.upgrade() {
                    Some(d) if !d.is_shut_down() => {}
                    _ => break,
                }
                publisher.poll();
                params.flush_notifications();
            }
            debug!("Status timer stopped");
        });

        BackgroundTasks { device, status }
    }

    /// Stop the timers and release the MIDI input
    pub fn shutdown(&self) {
        self.devices.shutdown();
        self.params.flush_notifications();
    }
}
