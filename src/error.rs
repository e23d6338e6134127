//! Centralized error type for the encore umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] encore_midi::Error),

    #[error(transparent)]
    Improviser(#[from] encore_ai::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the player should simply try again on the next silence.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Improviser(
                encore_ai::Error::DataInsufficient { .. } | encore_ai::Error::NotReady(_)
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
