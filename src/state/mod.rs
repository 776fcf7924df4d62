// State management module
// Caller-owned session results and MIDI file output

pub mod session;
pub mod storage;

pub use session::{ConversionResult, SessionError, SessionResult, SessionState};
pub use storage::{calculate_sha256, store_midi, to_data_uri, StorageError};
