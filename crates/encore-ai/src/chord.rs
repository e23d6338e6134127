//! Chords, their content keys, and the learned corpus.

use encore_midi::Tick;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pitches sharing one onset tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pitches: Vec<u8>,
    pub velocity: u8,
    /// Ticks until the chord sounds off. 0 if no off event was found.
    pub duration: Tick,
    /// Ticks until the next chord's onset. 0 if there is none.
    pub lag: Tick,
}

impl Chord {
    /// Returns `None` for an empty pitch set. Pitches are sorted and
    /// deduplicated.
    pub fn new(pitches: impl IntoIterator<Item = u8>, velocity: u8, duration: Tick, lag: Tick) -> Option<Self> {
        let mut pitches: Vec<u8> = pitches.into_iter().collect();
        pitches.sort_unstable();
        pitches.dedup();
        if pitches.is_empty() {
            return None;
        }
        Some(Self {
            pitches,
            velocity,
            duration: duration.max(0),
            lag: lag.max(0),
        })
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    pub fn lowest(&self) -> u8 {
        self.pitches[0]
    }

    pub fn key(&self) -> ChordKey {
        ChordKey::from_pitches(&self.pitches)
    }
}

/// Content address of a chord's pitch set.
///
/// The key is the sorted, deduplicated pitch list joined with `.`, so
/// `[67, 60, 64]` becomes `"60.64.67"`. Decimal numbers never contain the
/// delimiter, so two keys are equal exactly when the pitch sets are equal:
/// distinct sets never collide. Velocity, duration and lag are not part of
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChordKey(String);

impl ChordKey {
    pub fn from_pitches(pitches: &[u8]) -> Self {
        let mut sorted = pitches.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let key = sorted
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recovers the pitch set.
    pub fn pitches(&self) -> Vec<u8> {
        self.0.split('.').filter_map(|p| p.parse().ok()).collect()
    }
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index-aligned chords and keys from one pass over history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    chords: Vec<Chord>,
    keys: Vec<ChordKey>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chord: Chord) {
        self.keys.push(chord.key());
        self.chords.push(chord);
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn keys(&self) -> &[ChordKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chord> {
        self.chords.get(index)
    }
}

impl FromIterator<Chord> for Corpus {
    fn from_iter<I: IntoIterator<Item = Chord>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for chord in iter {
            corpus.push(chord);
        }
        corpus
    }
}
