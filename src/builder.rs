//! Builder for configuring and constructing a [`Player`].

use crate::config::PlayerConfig;
use crate::error::Result;
use crate::player::Player;
use encore_ai::{Backend, Improviser, ImproviserConfig};
use encore_midi::{MusicStore, NoteSink, NullSink};
use std::path::PathBuf;
use std::sync::Arc;

/// Unset parts fall back to the config: the backend named there, a history
/// loaded best-effort from `snapshot_path`, and a sink that drops everything.
///
/// # Example
///
/// ```ignore
/// use encore::prelude::*;
///
/// let player = Player::builder()
///     .bpm(96.0)
///     .backend(Backend::Markov)
///     .sink(Arc::new(MidiOutputPort::open(0)?))
///     .build()?;
///
/// let handle = player.start(MidiInputPort::open(0)?)?;
/// handle.join()?;
/// ```
#[derive(Default)]
pub struct PlayerBuilder {
    config: PlayerConfig,
    improviser: Option<Arc<dyn Improviser>>,
    history: Option<Arc<MusicStore>>,
    sink: Option<Arc<dyn NoteSink>>,
}

impl PlayerBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 120
    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.bpm = bpm;
        self
    }

    /// Default: 2
    pub fn silence_beats(mut self, beats: f64) -> Self {
        self.config.silence_beats = beats;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Default: 0
    pub fn channel(mut self, channel: u8) -> Self {
        self.config.channel = channel;
        self
    }

    pub fn follow_velocity(mut self, follow: bool) -> Self {
        self.config.follow_velocity = follow;
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    pub fn control_pitches(mut self, save: u8, playback: u8) -> Self {
        self.config.save_pitch = save;
        self.config.playback_pitch = playback;
        self
    }

    /// Generator settings for the configured backend.
    pub fn improviser_config(mut self, improviser: ImproviserConfig) -> Self {
        self.config.improviser = improviser;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.improviser.seed = Some(seed);
        self
    }

    /// Uses this strategy instead of building one from the config.
    pub fn improviser(mut self, improviser: Arc<dyn Improviser>) -> Self {
        self.improviser = Some(improviser);
        self
    }

    /// Uses this store instead of loading the snapshot.
    pub fn history(mut self, history: Arc<MusicStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Player> {
        self.config.validate()?;

        let history = match self.history {
            Some(history) => history,
            None => Arc::new(MusicStore::load_or_default(&self.config.snapshot_path)),
        };
        let improviser = match self.improviser {
            Some(improviser) => improviser,
            None => self.config.backend.build(self.config.improviser.clone())?,
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(NullSink));

        Ok(Player::new(self.config, history, improviser, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use encore_midi::Note;

    #[test]
    fn test_build_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player::builder()
            .snapshot_path(dir.path().join("history.json"))
            .build()
            .unwrap();
        assert!(player.history().is_empty());
        assert_eq!(player.improviser().name(), "continuation");
        assert!(!player.has_learned());
    }

    #[test]
    fn test_build_loads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = MusicStore::new();
        store.add_note(Note::on(60, 100, 0));
        store.save(&path).unwrap();

        let player = Player::builder().snapshot_path(&path).build().unwrap();
        assert_eq!(player.history().len(), 1);
    }

    #[test]
    fn test_build_selects_backend() {
        let player = Player::builder()
            .history(Arc::new(MusicStore::new()))
            .backend(Backend::Markov)
            .seed(7)
            .build()
            .unwrap();
        assert_eq!(player.improviser().name(), "markov");
        assert_eq!(player.config().improviser.seed, Some(7));
    }

    #[test]
    fn test_build_rejects_invalid() {
        let result = Player::builder()
            .history(Arc::new(MusicStore::new()))
            .channel(16)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
