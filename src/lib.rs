//! # Encore - Real-time MIDI Improviser
//!
//! Listens to a performer on a MIDI keyboard, learns short idiomatic
//! patterns from their own playing, and answers with new material whenever
//! they pause.
//!
//! ## Architecture
//!
//! Encore is an umbrella crate that coordinates:
//! - **encore-midi** - Notes, the music store, snapshots, MIDI files and device I/O
//! - **encore-ai** - Chord segmentation, continuation and probability backends
//!
//! The [`Player`] owns a fixed-rate tick loop that emits scheduled notes, a
//! capture thread that records the performer, and the learn + generate pass
//! started on silence.
//!
//! ## Quick Start
//!
//! ```ignore
//! use encore::prelude::*;
//!
//! let player = Player::builder()
//!     .config(PlayerConfig::load("encore.json")?)
//!     .sink(Arc::new(MidiOutputPort::open(0)?))
//!     .build()?;
//!
//! let handle = player.start(MidiInputPort::open(0)?)?;
//! handle.join()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `cli`
//! - `midi-io` - Hardware MIDI ports (midir)
//! - `cli` - The `encore` binary

/// Re-export of encore-midi for direct access
pub use encore_midi as midi;

/// Re-export of encore-ai for direct access
pub use encore_ai as ai;

mod error;
pub use error::{Error, Result};

mod config;
pub use config::PlayerConfig;

mod state;
pub use state::PlayerState;

mod player;
pub use player::{Player, PlayerHandle};

mod builder;
pub use builder::PlayerBuilder;

pub mod prelude {
    pub use crate::{Error, Player, PlayerBuilder, PlayerConfig, PlayerHandle, PlayerState, Result};

    pub use encore_ai::{Backend, Improviser, ImproviserConfig};
    pub use encore_midi::{
        loopback, CollectingSink, EventSource, InputEvent, MusicStore, Note, NoteSink, Tick,
    };

    #[cfg(feature = "midi-io")]
    pub use encore_midi::{MidiInputPort, MidiOutputPort};

    pub use std::sync::Arc;
}
