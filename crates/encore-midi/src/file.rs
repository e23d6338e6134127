//! Standard MIDI File import and export.
//!
//! Lets a session be seeded from an existing recording and lets history or
//! generated licks be opened in any sequencer. Uses the `midly` crate.

use crate::error::{Error, Result};
use crate::note::{Note, Tick};
use crate::store::MusicStore;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};
use std::path::Path;
use tracing::debug;

/// Reads every note event of a metrical SMF into a store, rescaling the
/// file's resolution to `ticks_per_beat`.
pub fn read_smf(path: impl AsRef<Path>, ticks_per_beat: u16) -> Result<MusicStore> {
    let data = std::fs::read(path.as_ref()).map_err(|e| Error::MidiFile(e.to_string()))?;
    parse_smf(&data, ticks_per_beat)
}

pub fn parse_smf(data: &[u8], ticks_per_beat: u16) -> Result<MusicStore> {
    let smf = Smf::parse(data)?;
    let file_tpb = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => return Err(Error::UnsupportedTiming),
    };
    if file_tpb == 0 {
        return Err(Error::MidiFile("zero ticks per beat".to_string()));
    }

    let store = MusicStore::new();
    for track in &smf.tracks {
        let mut file_tick: u64 = 0;
        for event in track {
            file_tick += event.delta.as_int() as u64;
            let tick = rescale(file_tick, file_tpb, ticks_per_beat);
            if let TrackEventKind::Midi { message, .. } = event.kind {
                let note = match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        Note::on(key.as_int(), vel.as_int(), tick)
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        Note::off(key.as_int(), tick)
                    }
                    _ => continue,
                };
                store.add_note(note);
            }
        }
    }

    debug!(
        tracks = smf.tracks.len(),
        file_tpb,
        notes = store.len(),
        "Parsed MIDI file"
    );
    Ok(store)
}

fn rescale(file_tick: u64, file_tpb: u16, ticks_per_beat: u16) -> Tick {
    let scaled = (file_tick * ticks_per_beat as u64 + file_tpb as u64 / 2) / file_tpb as u64;
    scaled as Tick
}

/// Writes notes as a single-track (format 0) file at `ticks_per_beat`
/// resolution. Ticks are shifted so the earliest note starts the file.
pub fn write_smf(
    notes: &[Note],
    ticks_per_beat: u16,
    bpm: f64,
    channel: u8,
    path: impl AsRef<Path>,
) -> Result<()> {
    let bytes = encode_smf(notes, ticks_per_beat, bpm, channel)?;
    std::fs::write(path.as_ref(), bytes).map_err(|e| Error::MidiFile(e.to_string()))
}

pub fn encode_smf(notes: &[Note], ticks_per_beat: u16, bpm: f64, channel: u8) -> Result<Vec<u8>> {
    if ticks_per_beat == 0 || ticks_per_beat > 0x7FFF {
        return Err(Error::MidiFile(format!(
            "ticks per beat out of range: {}",
            ticks_per_beat
        )));
    }
    if bpm <= 0.0 {
        return Err(Error::MidiFile(format!("invalid tempo: {}", bpm)));
    }

    let mut sorted = notes.to_vec();
    // Offs before ons on the same tick so a retriggered pitch is not cut short.
    sorted.sort_by_key(|n| (n.tick, n.on, n.pitch));

    let origin = sorted.first().map(|n| n.tick).unwrap_or(0);
    let micros_per_beat = (60_000_000.0 / bpm).round() as u32;
    let channel = u4::new(channel.min(15));

    let mut track = Vec::with_capacity(sorted.len() + 2);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_beat))),
    });

    let mut previous = origin;
    for note in &sorted {
        let delta = (note.tick - previous) as u32;
        previous = note.tick;
        let message = if note.on {
            MidiMessage::NoteOn {
                key: u7::new(note.pitch & 0x7F),
                vel: u7::new(note.velocity & 0x7F),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(note.pitch & 0x7F),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(ticks_per_beat)),
    ));
    smf.tracks.push(track);

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)
        .map_err(|e| Error::MidiFile(e.to_string()))?;
    Ok(bytes)
}
