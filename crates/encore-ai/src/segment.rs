//! Chord segmentation of a note history.
//!
//! Every tick carrying at least one note-on becomes a candidate chord. Pitches
//! below `pitch_floor` or softer than `min_velocity` are dropped; a tick left
//! with no pitches produces no chord but still counts as an onset when the
//! previous chord's lag is measured.
//!
//! Lag and duration lookups are exclusive of the chord's own tick: lag is the
//! distance to the nearest *later* onset, duration the distance to the nearest
//! *later* off of the same pitch. Unresolved lookups leave the field at 0.

use crate::chord::{Chord, Corpus};
use crate::config::ImproviserConfig;
use crate::error::{Error, Result};
use encore_midi::{MusicStore, NoteMap, Tick};
use std::collections::BTreeMap;
use tracing::debug;

/// Segments `notes` into a corpus.
///
/// Fails with [`Error::DataInsufficient`] when fewer chords than
/// [`ImproviserConfig::required_corpus_len`] come out.
pub fn segment(notes: &NoteMap, config: &ImproviserConfig) -> Result<Corpus> {
    let corpus = segment_unchecked(notes, config);
    let required = config.required_corpus_len();
    if corpus.len() < required {
        return Err(Error::DataInsufficient {
            found: corpus.len(),
            required,
        });
    }
    Ok(corpus)
}

/// Segments the store under a single read lock.
pub fn segment_store(history: &MusicStore, config: &ImproviserConfig) -> Result<Corpus> {
    history.with_read(|notes| segment(notes, config))
}

/// Segments without enforcing the minimum corpus length.
pub fn segment_unchecked(notes: &NoteMap, config: &ImproviserConfig) -> Corpus {
    let onsets: Vec<Tick> = notes
        .iter()
        .filter(|(_, slot)| slot.values().any(|n| n.on))
        .map(|(tick, _)| *tick)
        .collect();

    let mut offs: BTreeMap<u8, Vec<Tick>> = BTreeMap::new();
    for (tick, slot) in notes {
        for note in slot.values().filter(|n| !n.on) {
            offs.entry(note.pitch).or_default().push(*tick);
        }
    }

    let mut corpus = Corpus::new();
    for (i, &tick) in onsets.iter().enumerate() {
        let Some(slot) = notes.get(&tick) else {
            continue;
        };
        // BTreeMap iteration keeps the kept pitches ascending
        let kept: Vec<_> = slot
            .values()
            .filter(|n| n.on && n.pitch >= config.pitch_floor && n.velocity >= config.min_velocity)
            .collect();
        let Some(first) = kept.first() else {
            continue;
        };

        let lag = onsets
            .get(i + 1)
            .map(|next| (next - tick).min(config.max_lag))
            .unwrap_or(0);

        let duration = kept
            .iter()
            .find_map(|n| next_off(&offs, n.pitch, tick))
            .map(|off| off - tick)
            .unwrap_or(0);

        if let Some(chord) = Chord::new(kept.iter().map(|n| n.pitch), first.velocity, duration, lag) {
            corpus.push(chord);
        }
    }

    debug!(
        onsets = onsets.len(),
        chords = corpus.len(),
        "Segmented history"
    );
    corpus
}

fn next_off(offs: &BTreeMap<u8, Vec<Tick>>, pitch: u8, after: Tick) -> Option<Tick> {
    let ticks = offs.get(&pitch)?;
    let idx = ticks.partition_point(|&t| t <= after);
    ticks.get(idx).copied()
}
