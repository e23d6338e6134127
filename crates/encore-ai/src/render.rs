//! Turns a chord sequence into playable notes.

use crate::chord::Chord;
use crate::config::ImproviserConfig;
use encore_midi::{Note, Tick};
use rand::{Rng, RngCore};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Rounds `tick` down to the grid. A grid of 1 or less leaves it unchanged.
///
/// Idempotent: `quantize(quantize(t, g), g) == quantize(t, g)`.
#[inline]
pub fn quantize(tick: Tick, grid: Tick) -> Tick {
    if grid <= 1 {
        return tick;
    }
    tick - tick.rem_euclid(grid)
}

/// Running lag of a lick being assembled.
///
/// Lags are summed as recorded. Zero-lag chords add nothing until
/// `patience` of them arrive in a row; after that each further one counts
/// as a single tick, so a corpus without any lag still ends.
#[derive(Debug, Clone)]
pub struct LagTotal {
    total: Tick,
    stalled: usize,
    patience: usize,
}

impl LagTotal {
    pub fn new(patience: usize) -> Self {
        Self {
            total: 0,
            stalled: 0,
            patience: patience.max(1),
        }
    }

    pub fn add(&mut self, lag: Tick) {
        if lag > 0 {
            self.stalled = 0;
            self.total += lag;
        } else if self.stalled >= self.patience {
            self.total += 1;
        } else {
            self.stalled += 1;
        }
    }

    pub fn get(&self) -> Tick {
        self.total
    }

    pub fn exceeds(&self, target: Tick) -> bool {
        self.total > target
    }
}

/// Renders `chords` starting at the first grid line at or after `start`.
///
/// Chord onsets sit at `start` plus the summed lag of the chords before
/// them, each rounded down to the grid, so chords closer together than one
/// grid step collapse onto the same line. On a (tick, pitch) collision the
/// earlier note wins; an off that would land on a slot already holding an
/// on is dropped.
pub fn render<'a, I>(chords: I, start: Tick, config: &ImproviserConfig, rng: &mut dyn RngCore) -> Vec<Note>
where
    I: IntoIterator<Item = &'a Chord>,
{
    let grid = config.grid();
    let mut onset = quantize(start + grid - 1, grid);
    let mut ons: Vec<Note> = Vec::new();
    let mut offs: Vec<Note> = Vec::new();

    for chord in chords {
        if config.humanize && rng.gen_bool(config.humanize_chance) {
            onset += grid * rng.gen_range(1..=2);
        }

        let mut duration = if chord.duration > 0 {
            chord.duration
        } else {
            chord.lag.max(grid)
        };
        if config.staccato && duration > config.staccato_threshold {
            duration = (duration / 2).max(grid);
        }

        let on_tick = quantize(onset, grid);
        let off_tick = quantize(onset + duration, grid).max(on_tick + grid);

        let pitches = if config.allow_chords {
            chord.pitches()
        } else {
            &chord.pitches()[..1]
        };
        for &pitch in pitches {
            ons.push(Note::on(pitch, chord.velocity, on_tick));
            offs.push(Note::off(pitch, off_tick));
        }
        onset += chord.lag;
    }

    let mut slots: BTreeMap<(Tick, u8), Note> = BTreeMap::new();
    for note in ons.into_iter().chain(offs) {
        if let Entry::Vacant(e) = slots.entry((note.tick, note.pitch)) {
            e.insert(note);
        }
    }
    slots.into_values().collect()
}
