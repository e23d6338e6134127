//! Player configuration.

use crate::error::{Error, Result};
use encore_ai::{Backend, ImproviserConfig};
use encore_midi::Tick;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything the player needs, loadable from a JSON file.
///
/// Generator settings are flattened into the same object, so a config file
/// can set `bpm` and `window_max` side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub bpm: f64,
    /// Beats of performer silence before the player answers.
    pub silence_beats: f64,
    pub backend: Backend,
    /// Output channel (0-15).
    pub channel: u8,
    /// Note-on of this pitch writes the history snapshot.
    pub save_pitch: u8,
    /// Note-on of this pitch plays the whole history back.
    pub playback_pitch: u8,
    /// Soften output notes to the performer's velocity while a key is held.
    pub follow_velocity: bool,
    pub snapshot_path: PathBuf,
    #[serde(flatten)]
    pub improviser: ImproviserConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            silence_beats: 2.0,
            backend: Backend::default(),
            channel: 0,
            save_pitch: 21,
            playback_pitch: 22,
            follow_velocity: true,
            snapshot_path: PathBuf::from("music_history.json"),
            improviser: ImproviserConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(Error::InvalidConfig(format!("bpm must be positive, got {}", self.bpm)));
        }
        if !self.silence_beats.is_finite() || self.silence_beats < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "silence_beats must not be negative, got {}",
                self.silence_beats
            )));
        }
        if self.channel > 15 {
            return Err(Error::InvalidConfig(format!("channel {} out of range", self.channel)));
        }
        if self.save_pitch == self.playback_pitch {
            return Err(Error::InvalidConfig(
                "save_pitch and playback_pitch must differ".to_string(),
            ));
        }
        self.improviser.validate()?;
        Ok(())
    }

    #[inline]
    pub fn ticks_per_beat(&self) -> Tick {
        self.improviser.ticks_per_beat
    }

    /// Wall-clock length of one tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / (self.bpm * self.ticks_per_beat() as f64))
    }

    /// Silence threshold in ticks.
    pub fn silence_ticks(&self) -> Tick {
        (self.silence_beats * self.ticks_per_beat() as f64).round() as Tick
    }

    pub fn is_control_pitch(&self, pitch: u8) -> bool {
        pitch == self.save_pitch || pitch == self.playback_pitch
    }
}
