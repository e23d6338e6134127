//! Error types for learning and generation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The corpus is too short to learn from. The previous model is kept.
    #[error("not enough material to learn from: {found} chords, need at least {required}")]
    DataInsufficient { found: usize, required: usize },

    /// Generation was requested before a successful learn pass, or while one
    /// is running.
    #[error("improviser not ready: {0}")]
    NotReady(&'static str),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
