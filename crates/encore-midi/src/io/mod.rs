//! Hardware MIDI I/O.
//!
//! Device enumeration, connection, and real-time I/O via midir.
//! Requires the `midi-io` feature.

mod input;
mod output;

pub use input::{list_input_devices, MidiInputPort};
pub use output::{list_output_devices, MidiOutputPort};

/// An available hardware port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDevice {
    /// Port index (for `open`)
    pub index: usize,
    pub name: String,
}
