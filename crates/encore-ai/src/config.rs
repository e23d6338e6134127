//! Learning and generation parameters.

use crate::error::{Error, Result};
use encore_midi::Tick;
use serde::{Deserialize, Serialize};

/// One of the four per-note attributes the probability model tracks.
///
/// Declaration order is the order attributes are generated in, so a
/// [`Coupling::Current`] may only refer to an earlier attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Pitch,
    Velocity,
    Duration,
    Lag,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Pitch,
        Attribute::Velocity,
        Attribute::Duration,
        Attribute::Lag,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// What an attribute's distribution is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    #[default]
    Ignore,
    /// Value of the given attribute on the previous note.
    Previous(Attribute),
    /// Value of the given attribute on the note being generated.
    Current(Attribute),
}

/// Two coupling slots per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Couplings {
    pub pitch: [Coupling; 2],
    pub velocity: [Coupling; 2],
    pub duration: [Coupling; 2],
    pub lag: [Coupling; 2],
}

impl Default for Couplings {
    fn default() -> Self {
        use Attribute::*;
        use Coupling::*;
        Self {
            pitch: [Previous(Pitch), Ignore],
            velocity: [Current(Pitch), Previous(Velocity)],
            duration: [Previous(Duration), Ignore],
            lag: [Previous(Lag), Ignore],
        }
    }
}

impl Couplings {
    pub fn of(&self, attribute: Attribute) -> [Coupling; 2] {
        match attribute {
            Attribute::Pitch => self.pitch,
            Attribute::Velocity => self.velocity,
            Attribute::Duration => self.duration,
            Attribute::Lag => self.lag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImproviserConfig {
    /// Tick resolution; also the listening rate of the player.
    pub ticks_per_beat: Tick,
    /// Notes below this pitch are ignored when segmenting.
    pub pitch_floor: u8,
    /// Notes softer than this are ignored when segmenting.
    pub min_velocity: u8,
    /// Number of trailing chord keys used to find a continuation point.
    pub link_length: usize,
    pub window_min: usize,
    pub window_max: usize,
    /// Defaults to twice `window_max`.
    pub min_corpus_len: Option<usize>,
    /// Generation stops once the lick's cumulative lag exceeds this.
    pub lick_ticks: Tick,
    /// Upper bound on a chord's lag, so long pauses don't end up in licks.
    pub max_lag: Tick,
    /// Output grid. 1 disables quantization.
    pub quantize_ticks: Tick,
    pub humanize: bool,
    pub humanize_chance: f64,
    pub staccato: bool,
    pub staccato_threshold: Tick,
    /// When false every chord is reduced to its lowest pitch.
    pub allow_chords: bool,
    pub couplings: Couplings,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

pub const DEFAULT_TICKS_PER_BEAT: Tick = 64;

impl Default for ImproviserConfig {
    fn default() -> Self {
        let beat = DEFAULT_TICKS_PER_BEAT;
        Self {
            ticks_per_beat: beat,
            pitch_floor: 0,
            min_velocity: 1,
            link_length: 2,
            window_min: 4,
            window_max: 8,
            min_corpus_len: None,
            lick_ticks: 4 * beat,
            max_lag: 4 * beat,
            quantize_ticks: beat / 8,
            humanize: false,
            humanize_chance: 0.05,
            staccato: false,
            staccato_threshold: beat,
            allow_chords: true,
            couplings: Couplings::default(),
            seed: None,
        }
    }
}

impl ImproviserConfig {
    pub fn required_corpus_len(&self) -> usize {
        self.min_corpus_len.unwrap_or(2 * self.window_max)
    }

    /// Quantization grid, never below one tick.
    #[inline]
    pub fn grid(&self) -> Tick {
        self.quantize_ticks.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_beat < 1 {
            return Err(Error::InvalidConfig("ticks_per_beat must be at least 1".into()));
        }
        if self.link_length < 1 {
            return Err(Error::InvalidConfig("link_length must be at least 1".into()));
        }
        if self.link_length > self.window_min {
            return Err(Error::InvalidConfig(format!(
                "link_length {} exceeds window_min {}",
                self.link_length, self.window_min
            )));
        }
        if self.window_min > self.window_max {
            return Err(Error::InvalidConfig(format!(
                "window_min {} exceeds window_max {}",
                self.window_min, self.window_max
            )));
        }
        if self.required_corpus_len() < self.window_max {
            return Err(Error::InvalidConfig(format!(
                "min_corpus_len {} is shorter than window_max {}",
                self.required_corpus_len(),
                self.window_max
            )));
        }
        if self.max_lag < 1 {
            return Err(Error::InvalidConfig("max_lag must be at least 1".into()));
        }
        if self.lick_ticks < 0 {
            return Err(Error::InvalidConfig("lick_ticks must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.humanize_chance) {
            return Err(Error::InvalidConfig(format!(
                "humanize_chance {} not in [0, 1]",
                self.humanize_chance
            )));
        }
        for attribute in Attribute::ALL {
            for coupling in self.couplings.of(attribute) {
                if let Coupling::Current(other) = coupling {
                    if other >= attribute {
                        return Err(Error::InvalidConfig(format!(
                            "{:?} cannot depend on the current {:?}",
                            attribute, other
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
