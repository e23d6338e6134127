//! Error types for the MIDI layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI device error: {0}")]
    Device(String),

    #[error("MIDI port error: {0}")]
    Port(String),

    #[error("Invalid MIDI message: {0}")]
    InvalidMessage(String),

    #[error("Snapshot I/O error: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    StoreFormat(#[from] serde_json::Error),

    #[error("MIDI file error: {0}")]
    MidiFile(String),

    #[error("Unsupported MIDI timing format")]
    UnsupportedTiming,
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFile(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Device(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Port(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::Port(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
