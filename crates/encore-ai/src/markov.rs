//! Per-attribute conditional probability model.
//!
//! Each note is reduced to a [`Row`] of pitch, velocity, duration and lag.
//! Every attribute gets its own table of distributions keyed by up to two
//! coupled values (see [`Couplings`]). Sampling walks the outcomes from most
//! to least frequent and returns the first whose cumulative share reaches a
//! uniform draw in `0..PROBABILITY_RANGE`.

use crate::chord::{Chord, Corpus};
use crate::config::{Attribute, Coupling, Couplings, ImproviserConfig};
use crate::render::{render, LagTotal};
use encore_midi::{Note, Tick};
use rand::{Rng, RngCore};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Scale of the cumulative distributions.
pub const PROBABILITY_RANGE: u32 = 10_000;

/// Consecutive zero-lag rows stacked into one chord at most.
const MAX_STACK: usize = 4;

/// Pitch leaps wider than this are re-drawn.
const MAX_LEAP: i64 = 6;
const LEAP_RETRIES: usize = 3;

/// Values of the two coupled slots; `None` for an ignored slot.
pub type Condition = (Option<i64>, Option<i64>);

const UNCONDITIONED: Condition = (None, None);

/// One note's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub pitch: u8,
    pub velocity: u8,
    pub duration: Tick,
    pub lag: Tick,
}

impl Row {
    pub fn get(&self, attribute: Attribute) -> i64 {
        match attribute {
            Attribute::Pitch => self.pitch as i64,
            Attribute::Velocity => self.velocity as i64,
            Attribute::Duration => self.duration,
            Attribute::Lag => self.lag,
        }
    }

    fn from_values(values: [i64; 4]) -> Self {
        Self {
            pitch: values[0].clamp(0, 127) as u8,
            velocity: values[1].clamp(1, 127) as u8,
            duration: values[2].max(0),
            lag: values[3].max(0),
        }
    }
}

/// Splits chords into rows. Only a chord's last row carries its lag.
pub fn rows(corpus: &Corpus) -> Vec<Row> {
    let mut rows = Vec::new();
    for chord in corpus.chords() {
        let last = chord.pitches().len() - 1;
        for (i, &pitch) in chord.pitches().iter().enumerate() {
            rows.push(Row {
                pitch,
                velocity: chord.velocity,
                duration: chord.duration,
                lag: if i == last { chord.lag } else { 0 },
            });
        }
    }
    rows
}

/// Cumulative distribution over outcomes, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    entries: Vec<(i64, u32)>,
}

impl Distribution {
    pub fn from_counts(counts: &HashMap<i64, u32>) -> Option<Self> {
        let total: u64 = counts.values().map(|&c| c as u64).sum();
        if total == 0 {
            return None;
        }
        let mut outcomes: Vec<(i64, u32)> = counts.iter().map(|(&v, &c)| (v, c)).collect();
        outcomes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut running = 0u64;
        let mut entries: Vec<(i64, u32)> = outcomes
            .into_iter()
            .map(|(value, count)| {
                running += count as u64;
                (value, (running * PROBABILITY_RANGE as u64 / total) as u32)
            })
            .collect();
        if let Some(last) = entries.last_mut() {
            last.1 = PROBABILITY_RANGE;
        }
        Some(Self { entries })
    }

    /// First outcome whose cumulative value reaches `draw`.
    pub fn pick(&self, draw: u32) -> i64 {
        self.entries
            .iter()
            .find(|(_, cumulative)| *cumulative >= draw)
            .or(self.entries.last())
            .map(|(value, _)| *value)
            .unwrap_or(0)
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> i64 {
        self.pick(rng.gen_range(0..PROBABILITY_RANGE))
    }

    pub fn entries(&self) -> &[(i64, u32)] {
        &self.entries
    }
}

/// Learned tables for all four attributes.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    couplings: Couplings,
    tables: [HashMap<Condition, Distribution>; 4],
    rows: usize,
}

impl ProbabilityModel {
    pub fn learn(corpus: &Corpus, couplings: Couplings) -> Self {
        let rows = rows(corpus);
        let mut counts: [HashMap<Condition, HashMap<i64, u32>>; 4] = Default::default();

        for (k, row) in rows.iter().enumerate() {
            let prev = k.checked_sub(1).map(|p| &rows[p]);
            for attribute in Attribute::ALL {
                let value = row.get(attribute);
                let table = &mut counts[attribute.index()];
                *table.entry(UNCONDITIONED).or_default().entry(value).or_default() += 1;

                let current = |a: Attribute| Some(row.get(a));
                if let Some(condition) = condition(couplings.of(attribute), prev, current) {
                    if condition != UNCONDITIONED {
                        *table.entry(condition).or_default().entry(value).or_default() += 1;
                    }
                }
            }
        }

        let tables: [HashMap<Condition, Distribution>; 4] = counts.map(|table| {
            table
                .into_iter()
                .filter_map(|(condition, counts)| {
                    Distribution::from_counts(&counts).map(|d| (condition, d))
                })
                .collect()
        });
        debug!(rows = rows.len(), "Learned probability tables");
        Self {
            couplings,
            tables,
            rows: rows.len(),
        }
    }

    pub fn rows_learned(&self) -> usize {
        self.rows
    }

    /// Distribution for `attribute` under `condition`, if it was observed.
    pub fn distribution(&self, attribute: Attribute, condition: Condition) -> Option<&Distribution> {
        self.tables[attribute.index()].get(&condition)
    }

    /// Draws the next row, re-drawing wide melodic leaps a few times.
    pub fn next_row(&self, prev: Option<&Row>, rng: &mut dyn RngCore) -> Row {
        let mut row = self.draw_row(prev, rng);
        if let Some(prev) = prev.filter(|p| p.lag > 0) {
            for _ in 1..LEAP_RETRIES {
                if (row.pitch as i64 - prev.pitch as i64).abs() <= MAX_LEAP {
                    break;
                }
                trace!(from = prev.pitch, to = row.pitch, "Re-drawing leap");
                row = self.draw_row(Some(prev), rng);
            }
        }
        row
    }

    fn draw_row(&self, prev: Option<&Row>, rng: &mut dyn RngCore) -> Row {
        let mut values: [Option<i64>; 4] = [None; 4];
        for attribute in Attribute::ALL {
            let table = &self.tables[attribute.index()];
            let current = |a: Attribute| values[a.index()];
            let distribution = condition(self.couplings.of(attribute), prev, current)
                .and_then(|c| table.get(&c))
                .or_else(|| table.get(&UNCONDITIONED));
            values[attribute.index()] = Some(distribution.map(|d| d.sample(rng)).unwrap_or(0));
        }
        Row::from_values(values.map(|v| v.unwrap_or(0)))
    }

    /// Draws rows until their cumulative lag passes `lick_ticks`, groups them
    /// into chords and renders from `start_tick`.
    pub fn generate(&self, start_tick: Tick, config: &ImproviserConfig, rng: &mut dyn RngCore) -> Vec<Note> {
        if self.rows == 0 {
            return Vec::new();
        }
        let mut chords = Vec::new();
        let mut stack: Vec<Row> = Vec::new();
        let mut prev: Option<Row> = None;
        let mut total = LagTotal::new(self.rows);

        while !total.exceeds(config.lick_ticks) {
            let row = self.next_row(prev.as_ref(), rng);
            prev = Some(row);
            stack.push(row);
            if row.lag == 0 && stack.len() < MAX_STACK {
                continue;
            }
            let lag = row.lag;
            let head = stack[0];
            if let Some(chord) = Chord::new(stack.drain(..).map(|r| r.pitch), head.velocity, head.duration, lag) {
                chords.push(chord);
            }
            total.add(lag);
        }
        render(&chords, start_tick, config, rng)
    }
}

fn condition<F>(couplings: [Coupling; 2], prev: Option<&Row>, current: F) -> Option<Condition>
where
    F: Fn(Attribute) -> Option<i64>,
{
    let slot = |coupling: Coupling| -> Option<Option<i64>> {
        match coupling {
            Coupling::Ignore => Some(None),
            Coupling::Previous(a) => prev.map(|p| Some(p.get(a))),
            Coupling::Current(a) => current(a).map(Some),
        }
    };
    Some((slot(couplings[0])?, slot(couplings[1])?))
}
