// Pipeline execution and monitoring module
// Orchestrates feature response -> timeline -> MIDI file

pub mod convert;
pub mod trace;

pub use convert::{convert, encode, Pipeline, PipelineError};
pub use trace::{read_trace_file, PipelineStage, TraceEntry, TraceError, TraceWriter};
