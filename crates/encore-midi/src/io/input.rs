//! Hardware input: midir callback → bounded channel → blocking [`EventSource`].

use super::MidiDevice;
use crate::device::{EventSource, Polled};
use crate::error::{Error, Result};
use crate::message::InputEvent;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use midir::{MidiInput, MidiInputConnection};
use std::time::Duration;
use tracing::{debug, info};

const INPUT_QUEUE: usize = 1024;

pub fn list_input_devices() -> Vec<MidiDevice> {
    let mut devices = Vec::new();
    if let Ok(midi_input) = MidiInput::new("encore-device-list") {
        for (index, port) in midi_input.ports().iter().enumerate() {
            let name = midi_input
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index));
            devices.push(MidiDevice { index, name });
        }
    }
    devices
}

/// An open hardware input port.
///
/// Note events are parsed inside the driver callback and queued; everything
/// else the keyboard sends is dropped there.
pub struct MidiInputPort {
    connection: Option<MidiInputConnection<()>>,
    receiver: Receiver<InputEvent>,
    name: String,
}

impl MidiInputPort {
    pub fn open(port_index: usize) -> Result<Self> {
        let midi_input = MidiInput::new("encore-midi-input")?;
        let ports = midi_input.ports();
        let port = ports.get(port_index).ok_or_else(|| {
            Error::Device(format!("MIDI input device {} not found", port_index))
        })?;
        let name = midi_input
            .port_name(port)
            .unwrap_or_else(|_| format!("Device {}", port_index));

        let (sender, receiver) = bounded(INPUT_QUEUE);
        let connection = midi_input.connect(
            port,
            "encore-input",
            move |timestamp, message, _| match InputEvent::from_bytes(message, timestamp) {
                Ok(event) => {
                    if sender.try_send(event).is_err() {
                        debug!("MIDI input queue full, dropping event");
                    }
                }
                Err(e) => {
                    debug!("Ignoring MIDI message: {}", e);
                }
            },
            (),
        )?;

        info!(device = %name, "Opened MIDI input");
        Ok(Self {
            connection: Some(connection),
            receiver,
            name,
        })
    }

    pub fn open_by_name(name: &str) -> Result<Self> {
        let device = list_input_devices()
            .into_iter()
            .find(|d| d.name.to_lowercase().contains(&name.to_lowercase()))
            .ok_or_else(|| {
                Error::Device(format!("No MIDI input device found matching '{}'", name))
            })?;
        Self::open(device.index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disconnects from the device. Pending events can still be drained.
    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            debug!(device = %self.name, "Closed MIDI input");
        }
    }
}

impl EventSource for MidiInputPort {
    fn recv(&mut self) -> Option<InputEvent> {
        // The callback holds the sender, so the channel only disconnects
        // after close(); drain what is left and then report closed.
        if self.connection.is_none() {
            return self.receiver.try_recv().ok();
        }
        self.receiver.recv().ok()
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Polled {
        if self.connection.is_none() {
            return self.receiver.try_recv().map_or(Polled::Closed, Polled::Event);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Polled::Event(event),
            Err(RecvTimeoutError::Timeout) => Polled::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Polled::Closed,
        }
    }
}

impl Drop for MidiInputPort {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Availability depends on the system; this only checks enumeration
        // doesn't fail.
        let devices = list_input_devices();
        println!("Found {} MIDI input devices", devices.len());
    }

    #[test]
    fn test_open_missing_device() {
        assert!(MidiInputPort::open(usize::MAX).is_err());
    }
}
