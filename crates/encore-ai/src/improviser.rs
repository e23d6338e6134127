//! Learn/generate strategies.
//!
//! Both backends segment the whole history on every learn pass and publish
//! the result with a single `ArcSwapOption` store, so a concurrent
//! [`Improviser::generate`] sees either the previous model or the new one.
//! A failed learn leaves the previous model in place.

use crate::chord::Corpus;
use crate::config::ImproviserConfig;
use crate::continuation::ContinuationGenerator;
use crate::error::{Error, Result};
use crate::markov::ProbabilityModel;
use crate::segment::segment_store;
use arc_swap::ArcSwapOption;
use encore_midi::{MusicStore, Note, Tick};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Random source shared by one improviser.
pub type BoxedRng = Box<dyn RngCore + Send>;

/// `StdRng` seeded from `seed`, or from OS entropy.
pub fn seeded_rng(seed: Option<u64>) -> BoxedRng {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_entropy()),
    }
}

/// A strategy that learns from history and produces licks.
pub trait Improviser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rebuilds the model from the full history. Returns the corpus length.
    fn learn(&self, history: &MusicStore) -> Result<usize>;

    /// Renders a lick whose first note is at or after `start_tick`.
    fn generate(&self, start_tick: Tick) -> Result<Vec<Note>>;

    fn has_learned(&self) -> bool;
}

/// Which strategy a player uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Continuation,
    Markov,
}

impl Backend {
    pub fn build(self, config: ImproviserConfig) -> Result<Arc<dyn Improviser>> {
        let improviser: Arc<dyn Improviser> = match self {
            Backend::Continuation => Arc::new(ContinuationImproviser::new(config)?),
            Backend::Markov => Arc::new(MarkovImproviser::new(config)?),
        };
        Ok(improviser)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Continuation => write!(f, "continuation"),
            Backend::Markov => write!(f, "markov"),
        }
    }
}

/// Motif-linked continuation over the segmented corpus.
pub struct ContinuationImproviser {
    config: ImproviserConfig,
    corpus: ArcSwapOption<Corpus>,
    rng: Mutex<BoxedRng>,
}

impl ContinuationImproviser {
    pub fn new(config: ImproviserConfig) -> Result<Self> {
        let rng = seeded_rng(config.seed);
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: ImproviserConfig, rng: BoxedRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            corpus: ArcSwapOption::empty(),
            rng: Mutex::new(rng),
        })
    }

    pub fn config(&self) -> &ImproviserConfig {
        &self.config
    }

    /// Currently published corpus.
    pub fn corpus(&self) -> Option<Arc<Corpus>> {
        self.corpus.load_full()
    }
}

impl Improviser for ContinuationImproviser {
    fn name(&self) -> &'static str {
        "continuation"
    }

    fn learn(&self, history: &MusicStore) -> Result<usize> {
        let corpus = segment_store(history, &self.config)?;
        let len = corpus.len();
        self.corpus.store(Some(Arc::new(corpus)));
        info!(chords = len, "Learned corpus");
        Ok(len)
    }

    fn generate(&self, start_tick: Tick) -> Result<Vec<Note>> {
        let corpus = self
            .corpus
            .load_full()
            .ok_or(Error::NotReady("no corpus learned yet"))?;
        let generator = ContinuationGenerator::new(&corpus, &self.config);
        let mut rng = self.rng.lock();
        let notes = generator.generate(start_tick, &mut **rng);
        debug!(start_tick, notes = notes.len(), "Generated lick");
        Ok(notes)
    }

    fn has_learned(&self) -> bool {
        self.corpus.load().is_some()
    }
}

/// Per-attribute conditional probability model.
pub struct MarkovImproviser {
    config: ImproviserConfig,
    model: ArcSwapOption<ProbabilityModel>,
    rng: Mutex<BoxedRng>,
}

impl MarkovImproviser {
    pub fn new(config: ImproviserConfig) -> Result<Self> {
        let rng = seeded_rng(config.seed);
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: ImproviserConfig, rng: BoxedRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model: ArcSwapOption::empty(),
            rng: Mutex::new(rng),
        })
    }

    pub fn model(&self) -> Option<Arc<ProbabilityModel>> {
        self.model.load_full()
    }
}

impl Improviser for MarkovImproviser {
    fn name(&self) -> &'static str {
        "markov"
    }

    fn learn(&self, history: &MusicStore) -> Result<usize> {
        let corpus = segment_store(history, &self.config)?;
        let model = ProbabilityModel::learn(&corpus, self.config.couplings);
        info!(chords = corpus.len(), rows = model.rows_learned(), "Learned probability model");
        self.model.store(Some(Arc::new(model)));
        Ok(corpus.len())
    }

    fn generate(&self, start_tick: Tick) -> Result<Vec<Note>> {
        let model = self
            .model
            .load_full()
            .ok_or(Error::NotReady("no model learned yet"))?;
        let mut rng = self.rng.lock();
        let notes = model.generate(start_tick, &self.config, &mut **rng);
        debug!(start_tick, notes = notes.len(), "Generated lick");
        Ok(notes)
    }

    fn has_learned(&self) -> bool {
        self.model.load().is_some()
    }
}
