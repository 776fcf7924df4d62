// Event timeline module
// Event types, bucket-to-timeline assembly, and per-bucket explanations

pub mod assembler;
pub mod explainability;
pub mod key;
pub mod types;

pub use assembler::{assemble, assemble_with_report, Assembly};
pub use explainability::{BucketDecision, BucketOutcome, TimingSource};
pub use key::{KeySignature, KeySignatureError};
pub use types::{sort_events, Event};
