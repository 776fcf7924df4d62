// Standard MIDI File output
// Tick conversion, track building, and Type-1 file encoding

pub mod clock;
pub mod encoder;
pub mod track;

pub use clock::{to_tick, TickClock, DEFAULT_PPQ};
pub use encoder::{encode, encode_with_options, EncodeError, EncodeResult, MidiExportOptions};
pub use track::{serialize, TrackBuilder};
