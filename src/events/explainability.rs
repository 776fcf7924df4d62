// Explainability module
// Records what the assembler did with each bucket and why

use serde::{Deserialize, Serialize};

/// Where a note bucket's timeline came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimingSource {
    /// The bucket's own `time` array
    Own,

    /// A same-root bucket with a `time` array of matching length
    Borrowed { prefix: String },
}

/// Result of processing one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BucketOutcome {
    /// Time-signature entries listed; repeats collapse after sorting
    Metre { signatures: usize },

    /// Tempo events emitted
    Tempo { changes: usize },

    /// Notes emitted on a new track
    Notes {
        track_index: u32,
        notes: usize,
        timing: TimingSource,
    },

    /// Offered to its root's timing pool only
    Pooled,

    /// Nothing emitted
    Skipped { reason: String },
}

/// Decision information for a single bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDecision {
    pub prefix: String,

    /// Role name assigned at grouping (`note`, `metre`, ...)
    pub role: String,

    pub outcome: BucketOutcome,

    /// Human-readable summary
    pub reasoning: String,
}

impl BucketDecision {
    pub fn new(prefix: &str, role: &str, outcome: BucketOutcome) -> Self {
        let reasoning = match &outcome {
            BucketOutcome::Metre { signatures } => {
                format!("Metre bucket produced {} time signature(s).", signatures)
            }
            BucketOutcome::Tempo { changes } => {
                format!("Tempo bucket produced {} tempo change(s).", changes)
            }
            BucketOutcome::Notes {
                track_index,
                notes,
                timing,
            } => {
                let timing_desc = match timing {
                    TimingSource::Own => "its own time array".to_string(),
                    TimingSource::Borrowed { prefix } => {
                        format!("the time array borrowed from {}", prefix)
                    }
                };
                format!(
                    "Emitted {} note(s) on track {} (channel {}) using {}.",
                    notes,
                    track_index,
                    super::types::channel_for_track(*track_index),
                    timing_desc
                )
            }
            BucketOutcome::Pooled => "Timeline only; available for pairing.".to_string(),
            BucketOutcome::Skipped { reason } => format!("Skipped: {}.", reason),
        };

        BucketDecision {
            prefix: prefix.to_string(),
            role: role.to_string(),
            outcome,
            reasoning,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, BucketOutcome::Skipped { .. })
    }
}
