// Feature buckets
// Arrays sharing a path prefix, classified once into an explicit role

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arrays of a note source: pitches plus whatever timing it carries itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBucket {
    pub pitch: Vec<f64>,
    pub time: Option<Vec<f64>>,
    pub duration: Option<Vec<f64>>,
    pub velocity: Option<Vec<f64>>,
}

/// Time-signature changes; all three arrays have the same length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetreBucket {
    pub time: Vec<f64>,
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

/// Tempo changes; both arrays have the same length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoBucket {
    pub time: Vec<f64>,
    pub bpm: Vec<f64>,
}

/// A timeline without pitches, only useful as a pairing candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingBucket {
    pub time: Vec<f64>,
    pub duration: Option<Vec<f64>>,
    pub velocity: Option<Vec<f64>>,
}

impl NoteBucket {
    /// Collect the note arrays that accompany `pitch`
    fn from_fields(
        pitch: Vec<f64>,
        time: Option<Vec<f64>>,
        fields: &mut BTreeMap<String, Vec<f64>>,
    ) -> Self {
        NoteBucket {
            pitch,
            time,
            duration: fields.remove("duration"),
            velocity: fields.remove("velocity"),
        }
    }
}

/// What a bucket contributes to the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum BucketRole {
    /// Carries `numerator`, `denominator` and `time` of matching length,
    /// plus pitches when the bucket also has `pitch`
    Metre {
        metre: MetreBucket,
        notes: Option<NoteBucket>,
    },

    /// Carries `numerator` but cannot form signatures
    IncompleteMetre {
        reason: String,
        notes: Option<NoteBucket>,
    },

    /// Carries `pitch`
    Note(NoteBucket),

    /// Carries `bpm` and `time` of matching length
    Tempo(TempoBucket),

    /// Carries `time` and no pitches
    Timing(TimingBucket),

    /// Nothing the timeline can use
    Inert,
}

impl BucketRole {
    /// Decide the role from the scalar fields of one prefix.
    ///
    /// `numerator` wins over everything else, then `pitch`, then `bpm`
    /// (with a same-length `time`), then a bare `time`. Pitches found next to
    /// a `numerator` ride along as the metre bucket's note part.
    pub fn classify(mut fields: BTreeMap<String, Vec<f64>>) -> Self {
        if let Some(numerator) = fields.remove("numerator") {
            let denominator = fields.remove("denominator");
            let time = fields.remove("time");
            let notes = fields
                .remove("pitch")
                .map(|pitch| NoteBucket::from_fields(pitch, time.clone(), &mut fields));

            return match (time, denominator) {
                (Some(time), Some(denominator))
                    if time.len() == numerator.len() && time.len() == denominator.len() =>
                {
                    BucketRole::Metre {
                        metre: MetreBucket {
                            time,
                            numerator,
                            denominator,
                        },
                        notes,
                    }
                }
                (Some(time), Some(denominator)) => BucketRole::IncompleteMetre {
                    reason: format!(
                        "length mismatch: time={}, numerator={}, denominator={}",
                        time.len(),
                        numerator.len(),
                        denominator.len()
                    ),
                    notes,
                },
                (None, _) => BucketRole::IncompleteMetre {
                    reason: "missing time".to_string(),
                    notes,
                },
                (_, None) => BucketRole::IncompleteMetre {
                    reason: "missing denominator".to_string(),
                    notes,
                },
            };
        }

        let time = fields.remove("time");
        if let Some(pitch) = fields.remove("pitch") {
            return BucketRole::Note(NoteBucket::from_fields(pitch, time, &mut fields));
        }

        let time = match time {
            Some(time) => time,
            None => return BucketRole::Inert,
        };

        match fields.remove("bpm") {
            Some(bpm) if bpm.len() == time.len() => BucketRole::Tempo(TempoBucket { time, bpm }),
            _ => BucketRole::Timing(TimingBucket {
                time,
                duration: fields.remove("duration"),
                velocity: fields.remove("velocity"),
            }),
        }
    }

    /// Pitches this bucket contributes, whatever its main role
    pub fn notes(&self) -> Option<&NoteBucket> {
        match self {
            BucketRole::Note(notes) => Some(notes),
            BucketRole::Metre { notes, .. } | BucketRole::IncompleteMetre { notes, .. } => {
                notes.as_ref()
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BucketRole::Metre { .. } => "metre",
            BucketRole::IncompleteMetre { .. } => "incomplete_metre",
            BucketRole::Note(_) => "note",
            BucketRole::Tempo(_) => "tempo",
            BucketRole::Timing(_) => "timing",
            BucketRole::Inert => "inert",
        }
    }
}

/// Borrowed timeline a note bucket can pair with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingArrays<'a> {
    pub time: &'a [f64],
    pub duration: Option<&'a [f64]>,
    pub velocity: Option<&'a [f64]>,
}

/// All arrays sharing one path prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Path minus its last segment, e.g. `"A/n0"`
    pub prefix: String,

    /// First segment of the prefix
    pub root: String,

    pub role: BucketRole,
}

impl Bucket {
    /// The timeline this bucket offers to its root's pool, if any.
    ///
    /// Every bucket with a `time` array and no `numerator` qualifies: note
    /// buckets with their own `time`, tempo buckets and timing buckets.
    pub fn timing_candidate(&self) -> Option<TimingArrays<'_>> {
        match &self.role {
            BucketRole::Note(NoteBucket {
                time: Some(time),
                duration,
                velocity,
                ..
            }) => Some(TimingArrays {
                time,
                duration: duration.as_deref(),
                velocity: velocity.as_deref(),
            }),
            BucketRole::Tempo(tempo) => Some(TimingArrays {
                time: &tempo.time,
                duration: None,
                velocity: None,
            }),
            BucketRole::Timing(timing) => Some(TimingArrays {
                time: &timing.time,
                duration: timing.duration.as_deref(),
                velocity: timing.velocity.as_deref(),
            }),
            _ => None,
        }
    }
}
