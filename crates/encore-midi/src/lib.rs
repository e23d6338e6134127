//! MIDI layer for the encore improviser.
//!
//! Provides the note/tick model, the thread-safe music store used for both
//! history and scheduled output, snapshot persistence, Standard MIDI File
//! import/export, and the device capabilities the player consumes.
//!
//! # Features
//!
//! - **Music store**: tick → pitch → note, `RwLock`-guarded, append-only
//! - **Snapshots**: JSON save/load with best-effort recovery
//! - **MIDI files**: SMF import/export (via `midly`)
//! - **Hardware I/O**: port enumeration and real-time I/O (feature: `midi-io`)
//! - **Loopback**: in-memory keyboard and collecting sink for simulation
//!
//! # Example
//!
//! ```ignore
//! use encore_midi::{MusicStore, Note};
//!
//! let history = MusicStore::load_or_default("music_history.json");
//! history.add_note(Note::on(60, 100, 0));
//! history.add_note(Note::off(60, 32));
//! history.save("music_history.json")?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod note;
pub use note::{pitch_name, Note, Tick};

pub mod store;
pub use store::{MusicStore, NoteMap, TickNotes};

pub(crate) mod message;
pub use message::{InputEvent, ShortMessage, NOTE_OFF, NOTE_ON};

pub(crate) mod device;
pub use device::{EventSource, NoteSink, NullSink, Polled};

pub mod loopback;
pub use loopback::{loopback, CollectingSink, LoopbackKeyboard, LoopbackSource};

pub(crate) mod file;
pub use file::{encode_smf, parse_smf, read_smf, write_smf};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{list_input_devices, list_output_devices, MidiDevice, MidiInputPort, MidiOutputPort};
