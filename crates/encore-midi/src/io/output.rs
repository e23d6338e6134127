//! Hardware output: messages are sent from a dedicated thread so callers never
//! block on the driver.

use super::MidiDevice;
use crate::device::NoteSink;
use crate::error::{Error, Result};
use crate::message::ShortMessage;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use midir::{MidiOutput, MidiOutputConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

const OUTPUT_QUEUE: usize = 1024;

enum OutputCommand {
    Send(ShortMessage),
    Shutdown,
}

pub fn list_output_devices() -> Vec<MidiDevice> {
    let mut devices = Vec::new();
    if let Ok(midi_output) = MidiOutput::new("encore-device-list") {
        for (index, port) in midi_output.ports().iter().enumerate() {
            let name = midi_output
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index));
            devices.push(MidiDevice { index, name });
        }
    }
    devices
}

/// An open hardware output port.
pub struct MidiOutputPort {
    command_sender: Sender<OutputCommand>,
    is_connected: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl MidiOutputPort {
    pub fn open(port_index: usize) -> Result<Self> {
        let midi_output = MidiOutput::new("encore-midi-output")?;
        let ports = midi_output.ports();
        let port = ports.get(port_index).ok_or_else(|| {
            Error::Device(format!("MIDI output device {} not found", port_index))
        })?;
        let name = midi_output
            .port_name(port)
            .unwrap_or_else(|_| format!("Device {}", port_index));
        let connection = midi_output.connect(port, "encore-output")?;

        let (command_sender, command_receiver) = bounded(OUTPUT_QUEUE);
        let is_connected = Arc::new(AtomicBool::new(true));
        let is_connected_clone = Arc::clone(&is_connected);

        let thread = thread::Builder::new()
            .name("encore-midi-output".to_string())
            .spawn(move || Self::output_thread(connection, command_receiver, is_connected_clone))
            .map_err(|e| Error::Device(format!("failed to spawn MIDI output thread: {}", e)))?;

        info!(device = %name, "Opened MIDI output");
        Ok(Self {
            command_sender,
            is_connected,
            thread: Some(thread),
            name,
        })
    }

    pub fn open_by_name(name: &str) -> Result<Self> {
        let device = list_output_devices()
            .into_iter()
            .find(|d| d.name.to_lowercase().contains(&name.to_lowercase()))
            .ok_or_else(|| {
                Error::Device(format!("No MIDI output device found matching '{}'", name))
            })?;
        Self::open(device.index)
    }

    fn output_thread(
        mut connection: MidiOutputConnection,
        command_receiver: Receiver<OutputCommand>,
        is_connected: Arc<AtomicBool>,
    ) {
        while let Ok(command) = command_receiver.recv() {
            match command {
                OutputCommand::Send(message) => {
                    if let Err(e) = connection.send(&message.to_bytes()) {
                        warn!("MIDI send failed: {}", e);
                    }
                }
                OutputCommand::Shutdown => break,
            }
        }
        is_connected.store(false, Ordering::SeqCst);
        connection.close();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Stops the output thread after queued messages are flushed.
    pub fn close(&mut self) {
        let _ = self.command_sender.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!(device = %self.name, "Closed MIDI output");
        }
    }
}

impl NoteSink for MidiOutputPort {
    fn send_short_message(&self, status: u8, data1: u8, data2: u8) -> Result<()> {
        let message = ShortMessage::new(status, data1, data2);
        self.command_sender
            .try_send(OutputCommand::Send(message))
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::Device("MIDI output queue full".to_string()),
                TrySendError::Disconnected(_) => {
                    Error::Device("MIDI output thread not running".to_string())
                }
            })
    }
}

impl Drop for MidiOutputPort {
    fn drop(&mut self) {
        self.close();
    }
}
