//! Note events on the tick grid.
//!
//! A [`Note`] is a single on or off event for one pitch at one tick. Notes are
//! immutable once created: capture produces them from device events and the
//! improviser produces them when rendering a lick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest discrete unit of time used for scheduling and storage.
pub type Tick = i64;

/// A note-on or note-off at a given tick.
///
/// Older snapshots used capitalised field names and called the tick `Beat`;
/// both spellings are accepted when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    #[serde(alias = "On")]
    pub on: bool,
    #[serde(alias = "Pitch")]
    pub pitch: u8,
    #[serde(alias = "Velocity")]
    pub velocity: u8,
    #[serde(alias = "Beat")]
    pub tick: Tick,
}

impl Note {
    #[inline]
    pub fn on(pitch: u8, velocity: u8, tick: Tick) -> Self {
        Self {
            on: true,
            pitch,
            velocity,
            tick,
        }
    }

    #[inline]
    pub fn off(pitch: u8, tick: Tick) -> Self {
        Self {
            on: false,
            pitch,
            velocity: 0,
            tick,
        }
    }

    /// Same note moved to another tick.
    #[inline]
    pub fn at(self, tick: Tick) -> Self {
        Self { tick, ..self }
    }

    /// Scientific pitch name, e.g. `C4` for 60 or `Bb3` for 58.
    pub fn name(&self) -> String {
        pitch_name(self.pitch)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.on { "on" } else { "off" };
        write!(
            f,
            "{} {}({}) v{} @{}",
            state,
            self.name(),
            self.pitch,
            self.velocity,
            self.tick
        )
    }
}

const CHROMATIC: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Middle C (60) is `C4`.
pub fn pitch_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", CHROMATIC[(pitch % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_name(58), "Bb3");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn test_constructors() {
        let on = Note::on(60, 100, 12);
        assert!(on.on);
        assert_eq!(on.velocity, 100);

        let off = Note::off(60, 20);
        assert!(!off.on);
        assert_eq!(off.velocity, 0);
        assert_eq!(off.at(32).tick, 32);
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{"On":true,"Pitch":64,"Velocity":90,"Beat":128}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note, Note::on(64, 90, 128));
    }

    #[test]
    fn test_display() {
        assert_eq!(Note::on(60, 100, 4).to_string(), "on C4(60) v100 @4");
        assert_eq!(Note::off(61, 8).to_string(), "off Db4(61) v0 @8");
    }
}
