//! In-memory devices for simulation and tests.
//!
//! [`loopback`] returns a keyboard handle that injects performer events and the
//! matching [`EventSource`]. [`CollectingSink`] records every message sent to it.

use crate::device::{EventSource, NoteSink, Polled};
use crate::error::{Error, Result};
use crate::message::{InputEvent, ShortMessage};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use parking_lot::Mutex;
use tracing::debug;

/// Creates a connected keyboard/source pair with a bounded queue.
pub fn loopback(capacity: usize) -> (LoopbackKeyboard, LoopbackSource) {
    let (sender, receiver) = bounded(capacity);
    (LoopbackKeyboard { sender }, LoopbackSource { receiver })
}

/// Producer side of a loopback device. Dropping every clone closes the source.
#[derive(Clone)]
pub struct LoopbackKeyboard {
    sender: Sender<InputEvent>,
}

impl LoopbackKeyboard {
    /// Returns an error if the queue is full or the source was dropped.
    pub fn send(&self, event: InputEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => Error::Device("loopback queue full".to_string()),
            TrySendError::Disconnected(_) => Error::Device("loopback source closed".to_string()),
        })
    }

    pub fn press(&self, pitch: u8, velocity: u8) -> Result<()> {
        self.send(InputEvent::note_on(pitch, velocity))
    }

    pub fn release(&self, pitch: u8) -> Result<()> {
        self.send(InputEvent::note_off(pitch))
    }
}

pub struct LoopbackSource {
    receiver: Receiver<InputEvent>,
}

impl EventSource for LoopbackSource {
    fn recv(&mut self) -> Option<InputEvent> {
        self.receiver.recv().ok()
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Polled {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Polled::Event(event),
            Err(RecvTimeoutError::Timeout) => Polled::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Polled::Closed,
        }
    }
}

/// Sink that keeps every message in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<ShortMessage>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ShortMessage> {
        self.messages.lock().clone()
    }

    pub fn take(&self) -> Vec<ShortMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl NoteSink for CollectingSink {
    fn send_short_message(&self, status: u8, data1: u8, data2: u8) -> Result<()> {
        let message = ShortMessage::new(status, data1, data2);
        debug!(?message, "collected");
        self.messages.lock().push(message);
        Ok(())
    }
}
