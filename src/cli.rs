//! Command-line interface and REPL
//!
//! The REPL plays the role of the UI thread: it edits the gain directly and
//! shows the connection status and last received CC. Changes made elsewhere
//! (controller, host, hot-plug) are printed as they happen.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::debug;

use crate::device::midir_backend::is_virtual_port;
use crate::device::{DeviceManager, MidiInputBackend};
use crate::parameter::ParameterStore;
use crate::status::{cc_label, StatusDisplay, StatusPublisher};

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ShowGain,
    SetGain(f32),
    Status,
    Ports,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Command::Empty;
        };

        match (verb.to_lowercase().as_str(), parts.next()) {
            ("gain" | "g", None) => Command::ShowGain,
            ("gain" | "g", Some(arg)) => match arg.parse::<f32>() {
                Ok(value) => Command::SetGain(value),
                Err(_) => Command::Unknown(line.trim().to_string()),
            },
            ("status" | "s", _) => Command::Status,
            ("ports" | "p", _) => Command::Ports,
            ("help" | "h" | "?", _) => Command::Help,
            ("quit" | "exit" | "q", _) => Command::Quit,
            _ => Command::Unknown(line.trim().to_string()),
        }
    }
}

/// Register the console's redraw hooks.
///
/// `on_gain` runs for every gain change, whoever made it; `on_status` runs
/// when the polled connection state changes.
pub fn attach_ui_listeners<G, S>(
    params: &ParameterStore,
    status: &StatusPublisher,
    on_gain: G,
    on_status: S,
) where
    G: Fn(f32) + Send + Sync + 'static,
    S: Fn(StatusDisplay) + Send + Sync + 'static,
{
    params.subscribe(Arc::new(on_gain));
    status.subscribe(Arc::new(move |state| on_status(StatusDisplay::for_state(state))));
}

/// Run the interactive console until `quit` or EOF. Blocking.
pub fn run_repl(
    params: Arc<ParameterStore>,
    devices: Arc<DeviceManager>,
    status: Arc<StatusPublisher>,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    attach_ui_listeners(&params, &status, print_gain_value, |display| {
        println!("{}", paint(&display));
    });
    print_help();

    loop {
        let readline = rl.readline("gain> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match Command::parse(&line) {
                    Command::ShowGain => print_gain(&params),
                    Command::SetGain(value) => {
                        let before = params.read();
                        params.write(value);
                        // The listener already printed any change
                        if params.read() == before {
                            print_gain(&params);
                        }
                    }
                    Command::Status => print_status(&status, &devices),
                    Command::Ports => print_endpoints(&devices),
                    Command::Help => print_help(),
                    Command::Quit => break,
                    Command::Empty => {}
                    Command::Unknown(text) => {
                        println!("{} {}", "Unknown command:".red(), text);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    debug!("REPL closed");
    Ok(())
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  gain          show the current gain");
    println!("  gain <0..1>   set the gain");
    println!("  status        MIDI controller status and last CC");
    println!("  ports         list MIDI inputs");
    println!("  quit          exit");
}

fn print_gain(params: &ParameterStore) {
    print_gain_value(params.read());
}

fn print_gain_value(gain: f32) {
    let width = 20;
    let filled = (gain * width as f32).round() as usize;
    println!(
        "Gain: {:.3} [{}{}]",
        gain,
        "#".repeat(filled).bright_green(),
        "-".repeat(width - filled).dimmed()
    );
}

fn paint(display: &StatusDisplay) -> ColoredString {
    let rgb = display.color.0;
    display
        .text
        .truecolor((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

/// Status panel as plain lines: label, device (when attached), last CC
pub fn status_lines(status: &StatusPublisher, devices: &DeviceManager) -> Vec<String> {
    let mut lines = vec![status.display().text.to_string()];
    if let Some(endpoint) = devices.attached_endpoint() {
        lines.push(format!("  Device: {}", endpoint.name));
    }
    let activity = devices.dispatch().activity();
    lines.push(format!("  {} ({} received)", cc_label(activity), activity.received()));
    lines
}

fn print_status(status: &StatusPublisher, devices: &DeviceManager) {
    let mut lines = status_lines(status, devices).into_iter();
    lines.next();
    println!("{}", paint(&status.display()));
    for line in lines {
        println!("{}", line);
    }
}

fn print_endpoints(devices: &DeviceManager) {
    let attached = devices.attached_endpoint().map(|ep| ep.id);
    match devices.list_endpoints() {
        Ok(endpoints) if endpoints.is_empty() => {
            println!("  {}", "No input ports found".dimmed());
        }
        Ok(endpoints) => {
            for (endpoint, eligible) in endpoints {
                let marker = if attached.as_deref() == Some(endpoint.id.as_str()) {
                    "[ACTIVE]".bright_green()
                } else if eligible {
                    "[ELIGIBLE]".green()
                } else {
                    "[FILTERED]".dimmed()
                };
                println!("  {} {}", marker, endpoint.name);
            }
        }
        Err(e) => println!("{} {}", "Failed to list MIDI inputs:".red(), e),
    }
}

/// Print every MIDI input for `--list-ports`
pub fn list_ports_formatted(backend: &dyn MidiInputBackend) {
    println!("\n{}", "=== Available MIDI Input Ports ===".bold().cyan());

    match backend.enumerate() {
        Ok(ports) if ports.is_empty() => {
            println!("  {}", "No input ports found".dimmed());
        }
        Ok(ports) => {
            for port in ports {
                let marker = if is_virtual_port(&port.name) {
                    "[VIRTUAL]".yellow()
                } else {
                    "[PHYSICAL]".green()
                };
                println!("  {} {} {}", marker, port.name, format!("({})", port.id).dimmed());
            }
        }
        Err(e) => println!("  {} {}", "Failed to enumerate:".red(), e),
    }
    println!();
}
