// ptmidi - Feature response to Standard MIDI File converter
// Module declarations

pub mod commands;
pub mod config;
pub mod events;
pub mod features;
pub mod pipeline;
pub mod smf;
pub mod state;

pub use events::Event;
pub use pipeline::{convert, encode};
