//! MIDI Gain - standalone control host
//!
//! Runs the gain unit's control side: MIDI controller hot-plug, status
//! reporting and a console acting as the UI.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_gain::cli;
use midi_gain::config::AppConfig;
use midi_gain::device::{MidiInputBackend, MidirBackend};
use midi_gain::unit::GainUnit;

/// MIDI Gain - gain control from a MIDI CC 7 controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "midi-gain.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Only use MIDI inputs whose name contains this text
    #[arg(short, long, env = "MIDI_GAIN_DEVICE")]
    device: Option<String>,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting MIDI Gain...");

    let mut config = load_config(&args.config).await?;
    if let Some(device) = args.device {
        config.midi.device_filter = Some(device);
    }

    let backend: Arc<dyn MidiInputBackend> =
        Arc::new(MidirBackend::new(config.midi.client_name.clone()));

    if args.list_ports {
        cli::list_ports_formatted(backend.as_ref());
        return Ok(());
    }

    let unit = GainUnit::new(&config, backend);
    unit.params().set_host_notifier(Arc::new(|value| {
        debug!("Host notified: gain = {:.3}", value);
    }));

    let tasks = unit.start();

    // The console blocks on stdin, keep it off the runtime workers
    let params = unit.params().clone();
    let devices = unit.devices().clone();
    let status = unit.status().clone();
    let repl = tokio::task::spawn_blocking(move || cli::run_repl(params, devices, status));

    let console_closed = tokio::select! {
        result = repl => {
            match result {
                Ok(Ok(())) => info!("Console closed"),
                Ok(Err(e)) => warn!("Console error: {}", e),
                Err(e) => warn!("Console task failed: {}", e),
            }
            true
        }
        _ = shutdown_signal() => false,
    };

    // MIDI callback must be gone before the manager is dropped
    unit.shutdown();
    tasks.join().await;

    info!("MIDI Gain shutdown complete");

    if !console_closed {
        // A blocking stdin read cannot be cancelled; the runtime would wait on it
        std::process::exit(0);
    }
    Ok(())
}

async fn load_config(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        let config = AppConfig::load(path).await?;
        info!("Configuration loaded from {}", path);
        Ok(config)
    } else {
        info!("No configuration file at {}, using defaults", path);
        Ok(AppConfig::default())
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
