//! Motif-linked continuation of a corpus.
//!
//! A lick is assembled from verbatim runs of the corpus. Each outer step
//! appends a window of consecutive chords, then looks for other places in
//! the corpus where the last `link_length` keys occur and jumps to one of
//! them at random, so consecutive windows overlap on a shared motif. When
//! the motif occurs nowhere else the cursor simply moves on past the
//! window. Assembly stops once the cumulative lag passes `lick_ticks`;
//! after a run of zero lags as long as the corpus, each further chord
//! counts one tick, so assembly always ends.
//!
//! Matching runs over a wrap-padded key view of length `n + 2 * window_max`,
//! so motifs that straddle the end of the corpus are found too. Only
//! offsets inside the unpadded middle are considered as candidates.

use crate::chord::{ChordKey, Corpus};
use crate::config::ImproviserConfig;
use crate::render::{render, LagTotal};
use encore_midi::{Note, Tick};
use rand::{Rng, RngCore};
use tracing::trace;

pub struct ContinuationGenerator<'a> {
    corpus: &'a Corpus,
    config: &'a ImproviserConfig,
    padded: Vec<&'a ChordKey>,
    pad: usize,
}

impl<'a> ContinuationGenerator<'a> {
    pub fn new(corpus: &'a Corpus, config: &'a ImproviserConfig) -> Self {
        let n = corpus.len();
        let pad = config.window_max;
        let keys = corpus.keys();
        let padded = if n == 0 {
            Vec::new()
        } else {
            (0..n + 2 * pad)
                .map(|j| &keys[(j as i64 - pad as i64).rem_euclid(n as i64) as usize])
                .collect()
        };
        Self {
            corpus,
            config,
            padded,
            pad,
        }
    }

    /// Corpus positions other than `exclude` where `motif` starts.
    ///
    /// Every returned position is in `0..n`, and a window of up to
    /// `window_max` chords read from it stays inside the padded view.
    pub fn candidates(&self, motif: &[ChordKey], exclude: Option<usize>) -> Vec<usize> {
        let n = self.corpus.len();
        if n == 0 || motif.is_empty() || motif.len() > self.pad + 1 {
            return Vec::new();
        }
        (self.pad..self.pad + n)
            .filter(|&i| {
                self.padded[i..i + motif.len()]
                    .iter()
                    .zip(motif)
                    .all(|(a, b)| *a == b)
            })
            .map(|i| i - self.pad)
            .filter(|&p| Some(p) != exclude)
            .collect()
    }

    /// Corpus indices of one lick, in playing order.
    pub fn assemble(&self, rng: &mut dyn RngCore) -> Vec<usize> {
        let n = self.corpus.len();
        if n == 0 {
            return Vec::new();
        }
        let chords = self.corpus.chords();
        let keys = self.corpus.keys();
        let link = self.config.link_length.max(1);
        let window_min = self.config.window_min.max(1);
        let window_max = self.config.window_max.max(window_min);

        let mut indices = Vec::new();
        let mut total = LagTotal::new(n);
        let mut start = rng.gen_range(0..n);

        loop {
            let window = rng.gen_range(window_min..=window_max);
            for i in 0..window {
                let idx = (start + i) % n;
                indices.push(idx);
                total.add(chords[idx].lag);
            }
            if total.exceeds(self.config.lick_ticks) {
                break;
            }

            let link = link.min(window);
            let motif: Vec<ChordKey> = indices[indices.len() - link..]
                .iter()
                .map(|&i| keys[i].clone())
                .collect();
            let own = (start + window - link) % n;
            let found = self.candidates(&motif, Some(own));
            start = if found.is_empty() {
                trace!(start, window, "No other occurrence of motif, advancing");
                (start + window) % n
            } else {
                let pick = found[rng.gen_range(0..found.len())];
                trace!(candidates = found.len(), pick, "Relinked");
                (pick + link) % n
            };
        }
        indices
    }

    /// Assembles a lick and renders it from `start_tick`.
    pub fn generate(&self, start_tick: Tick, rng: &mut dyn RngCore) -> Vec<Note> {
        let indices = self.assemble(rng);
        let chords = self.corpus.chords();
        render(indices.iter().map(|&i| &chords[i]), start_tick, self.config, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::Chord;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus(pitches: &[u8], lag: Tick) -> Corpus {
        pitches
            .iter()
            .filter_map(|&p| Chord::new([p], 100, lag / 2, lag))
            .collect()
    }

    fn keys(pitches: &[u8]) -> Vec<ChordKey> {
        pitches.iter().map(|&p| ChordKey::from_pitches(&[p])).collect()
    }

    #[test]
    fn test_candidates_skip_self() {
        let corpus = corpus(&[60, 62, 64, 60, 62, 67], 16);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        assert_eq!(generator.candidates(&keys(&[60, 62]), None), vec![0, 3]);
        assert_eq!(generator.candidates(&keys(&[60, 62]), Some(3)), vec![0]);
        assert!(generator.candidates(&keys(&[61]), None).is_empty());
    }

    #[test]
    fn test_candidates_across_wrap() {
        let corpus = corpus(&[62, 64, 65, 60], 16);
        let config = ImproviserConfig {
            window_min: 2,
            window_max: 2,
            min_corpus_len: Some(4),
            ..Default::default()
        };
        let generator = ContinuationGenerator::new(&corpus, &config);
        assert_eq!(generator.candidates(&keys(&[60, 62]), None), vec![3]);
    }

    #[test]
    fn test_unique_motifs_play_contiguously() {
        let pitches: Vec<u8> = (48..64).collect();
        let corpus = corpus(&pitches, 16);
        let config = ImproviserConfig {
            lick_ticks: 16 * 20,
            ..Default::default()
        };
        let generator = ContinuationGenerator::new(&corpus, &config);
        let mut rng = StdRng::seed_from_u64(3);
        let indices = generator.assemble(&mut rng);
        for pair in indices.windows(2) {
            assert_eq!(pair[1], (pair[0] + 1) % pitches.len());
        }
    }

    #[test]
    fn test_lick_exceeds_target() {
        let corpus = corpus(&[60, 62, 64, 60, 62, 67, 69, 60, 62, 71, 72, 74, 76, 60, 62, 77], 24);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        let mut rng = StdRng::seed_from_u64(11);
        let indices = generator.assemble(&mut rng);
        let total: Tick = indices.iter().map(|&i| corpus.chords()[i].lag).sum();
        assert!(total > config.lick_ticks);
    }

    #[test]
    fn test_identical_corpus_terminates() {
        let corpus = corpus(&[60; 16], 8);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        let mut rng = StdRng::seed_from_u64(5);
        let notes = generator.generate(0, &mut rng);
        assert!(!notes.is_empty());
        assert!(notes.iter().all(|n| n.pitch == 60));
    }

    #[test]
    fn test_zero_lag_corpus_terminates() {
        let corpus = corpus(&[60; 16], 0);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        let mut rng = StdRng::seed_from_u64(5);
        let indices = generator.assemble(&mut rng);
        assert!(indices.len() > corpus.len() + config.lick_ticks as usize);
    }

    #[test]
    fn test_sub_grid_lag_counts_raw() {
        let pitches: Vec<u8> = (0..32).map(|i| 48 + (i % 12) as u8).collect();
        let corpus = corpus(&pitches, 4);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);

        let indices = generator.assemble(&mut StdRng::seed_from_u64(1));
        let total: Tick = indices.iter().map(|&i| corpus.chords()[i].lag).sum();
        assert!(total > config.lick_ticks, "stopped at {}", total);

        let notes = generator.generate(0, &mut StdRng::seed_from_u64(1));
        let mut ons: Vec<Tick> = notes.iter().filter(|n| n.on).map(|n| n.tick).collect();
        ons.dedup();
        // two chords share each grid line
        for pair in ons.windows(2) {
            assert_eq!(pair[1] - pair[0], config.grid());
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let corpus = corpus(&[60, 62, 64, 60, 62, 67, 69, 60, 62, 71, 72, 74, 76, 60, 62, 77], 16);
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        let a = generator.generate(100, &mut StdRng::seed_from_u64(9));
        let b = generator.generate(100, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::new();
        let config = ImproviserConfig::default();
        let generator = ContinuationGenerator::new(&corpus, &config);
        assert!(generator.assemble(&mut StdRng::seed_from_u64(1)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_relink_stays_in_range(
            pitches in prop::collection::vec(60u8..63, 16..40),
            window_max in 2usize..10,
            seed in any::<u64>(),
        ) {
            let corpus = corpus(&pitches, 16);
            let config = ImproviserConfig {
                window_min: 2,
                window_max,
                ..Default::default()
            };
            let generator = ContinuationGenerator::new(&corpus, &config);
            let n = corpus.len();
            for start in 0..n {
                let motif: Vec<ChordKey> = (0..2).map(|i| corpus.keys()[(start + i) % n].clone()).collect();
                for p in generator.candidates(&motif, None) {
                    prop_assert!(p < n);
                    prop_assert!(p + generator.pad + motif.len() <= generator.padded.len());
                    for (i, key) in motif.iter().enumerate() {
                        prop_assert_eq!(generator.padded[p + generator.pad + i], key);
                        prop_assert_eq!(&corpus.keys()[(p + i) % n], key);
                    }
                }
            }
            for idx in generator.assemble(&mut StdRng::seed_from_u64(seed)) {
                prop_assert!(idx < n);
            }
        }
    }
}
