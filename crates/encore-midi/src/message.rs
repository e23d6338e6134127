//! Channel voice messages exchanged with the keyboard.

use crate::error::{Error, Result};
use crate::note::Note;
use midi_msg::{ChannelVoiceMsg, MidiMsg};

pub const NOTE_ON: u8 = 0x90;
pub const NOTE_OFF: u8 = 0x80;

/// A performer event as delivered by an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub on: bool,
    /// Device timestamp in microseconds.
    pub timestamp_us: u64,
}

impl InputEvent {
    pub fn note_on(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch,
            velocity,
            on: velocity > 0,
            timestamp_us: 0,
        }
    }

    pub fn note_off(pitch: u8) -> Self {
        Self {
            pitch,
            velocity: 0,
            on: false,
            timestamp_us: 0,
        }
    }

    /// Parses raw MIDI bytes. Note-on with velocity 0 is treated as note-off.
    /// Non-note messages are rejected.
    pub fn from_bytes(bytes: &[u8], timestamp_us: u64) -> Result<Self> {
        let (msg, _len) = MidiMsg::from_midi(bytes)
            .map_err(|e| Error::InvalidMessage(format!("{:?}", e)))?;
        match msg {
            MidiMsg::ChannelVoice {
                msg: ChannelVoiceMsg::NoteOn { note, velocity },
                ..
            } => Ok(Self {
                pitch: note,
                velocity,
                on: velocity > 0,
                timestamp_us,
            }),
            MidiMsg::ChannelVoice {
                msg: ChannelVoiceMsg::NoteOff { note, .. },
                ..
            } => Ok(Self {
                pitch: note,
                velocity: 0,
                on: false,
                timestamp_us,
            }),
            other => Err(Error::InvalidMessage(format!(
                "expected note message, got {:?}",
                other
            ))),
        }
    }
}

/// A three-byte short message ready for an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl ShortMessage {
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    pub fn note_on(channel: u8, pitch: u8, velocity: u8) -> Self {
        let channel = channel.min(15);
        Self::new(NOTE_ON | channel, pitch & 0x7F, velocity & 0x7F)
    }

    pub fn note_off(channel: u8, pitch: u8, velocity: u8) -> Self {
        let channel = channel.min(15);
        Self::new(NOTE_OFF | channel, pitch & 0x7F, velocity & 0x7F)
    }

    pub fn from_note(channel: u8, note: &Note) -> Self {
        if note.on {
            Self::note_on(channel, note.pitch, note.velocity)
        } else {
            Self::note_off(channel, note.pitch, note.velocity)
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.status & 0xF0 == NOTE_ON && self.data2 > 0
    }
}
