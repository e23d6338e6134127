//! Device capabilities consumed by the player.
//!
//! The player never talks to a driver directly: it reads performer events from
//! an [`EventSource`] and writes short messages to a [`NoteSink`]. Hardware
//! ports, the in-memory loopback and test doubles all implement these.

use crate::error::Result;
use crate::message::{InputEvent, ShortMessage};
use std::sync::Arc;
use std::time::Duration;

/// Result of waiting on an [`EventSource`] with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polled {
    Event(InputEvent),
    TimedOut,
    Closed,
}

/// Blocking stream of performer events.
pub trait EventSource: Send {
    /// Blocks until the next event arrives. `None` once the source is closed.
    fn recv(&mut self) -> Option<InputEvent>;

    /// Waits at most `timeout` for the next event.
    fn recv_timeout(&mut self, timeout: Duration) -> Polled;
}

/// Non-blocking output of short messages.
pub trait NoteSink: Send + Sync {
    fn send_short_message(&self, status: u8, data1: u8, data2: u8) -> Result<()>;

    fn send(&self, message: ShortMessage) -> Result<()> {
        self.send_short_message(message.status, message.data1, message.data2)
    }
}

impl<T: NoteSink + ?Sized> NoteSink for Arc<T> {
    fn send_short_message(&self, status: u8, data1: u8, data2: u8) -> Result<()> {
        (**self).send_short_message(status, data1, data2)
    }
}

impl<T: NoteSink + ?Sized> NoteSink for Box<T> {
    fn send_short_message(&self, status: u8, data1: u8, data2: u8) -> Result<()> {
        (**self).send_short_message(status, data1, data2)
    }
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn recv(&mut self) -> Option<InputEvent> {
        (**self).recv()
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Polled {
        (**self).recv_timeout(timeout)
    }
}

/// Sink that drops everything. Used when no output device is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NoteSink for NullSink {
    fn send_short_message(&self, _status: u8, _data1: u8, _data2: u8) -> Result<()> {
        Ok(())
    }
}
