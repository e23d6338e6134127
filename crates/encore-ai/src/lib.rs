//! Learning and lick generation for the encore improviser.
//!
//! # Features
//!
//! - **Chord segmentation**: groups simultaneous note-ons into chords with
//!   duration and lag, keyed by their pitch set
//! - **Continuation**: re-joins verbatim runs of the performer's history at
//!   points where the trailing motif recurs
//! - **Probability model**: per-attribute conditional distributions as an
//!   alternative backend
//! - **Rendering**: grid quantization, humanization, staccato and
//!   monophonic reduction
//!
//! Both backends implement [`Improviser`], so the player can swap them.
//!
//! # Example
//!
//! ```ignore
//! use encore_ai::{Backend, ImproviserConfig};
//!
//! let improviser = Backend::Continuation.build(ImproviserConfig::default())?;
//! improviser.learn(&history)?;
//! let lick = improviser.generate(current_tick + 1)?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{Attribute, Coupling, Couplings, ImproviserConfig, DEFAULT_TICKS_PER_BEAT};

pub mod chord;
pub use chord::{Chord, ChordKey, Corpus};

pub mod segment;
pub use segment::{segment, segment_store, segment_unchecked};

pub mod render;
pub use render::{quantize, render};

pub mod continuation;
pub use continuation::ContinuationGenerator;

pub mod markov;
pub use markov::{Distribution, ProbabilityModel, Row, PROBABILITY_RANGE};

pub(crate) mod improviser;
pub use improviser::{
    seeded_rng, Backend, BoxedRng, ContinuationImproviser, Improviser, MarkovImproviser,
};
