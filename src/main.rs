//! `encore [config.json]`
//!
//! Connects the first MIDI input and output ports and improvises until the
//! input closes. Logging follows `RUST_LOG` (default `info`).

use encore::midi::{list_input_devices, list_output_devices, MidiInputPort, MidiOutputPort};
use encore::{Player, PlayerConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run() -> encore::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    for device in list_input_devices() {
        info!(index = device.index, name = %device.name, "MIDI input");
    }
    for device in list_output_devices() {
        info!(index = device.index, name = %device.name, "MIDI output");
    }

    let output = MidiOutputPort::open(0)?;
    let input = MidiInputPort::open(0)?;
    info!(input = input.name(), output = output.name(), "Connected");

    let player = Player::builder()
        .config(config)
        .sink(Arc::new(output))
        .build()?;
    let handle = player.start(input)?;
    handle.join()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
