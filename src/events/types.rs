// Timeline event types
// Tempo, metre, key, text, and note events on a fractional time axis

use serde::{Deserialize, Serialize};

use super::key::KeySignature;

/// Tempo used when the input supplies none
pub const DEFAULT_BPM: f64 = 120.0;

/// Time signature used when the input supplies none
pub const DEFAULT_TIME_SIGNATURE: (u8, u8) = (4, 4);

/// Note length when the input has no `duration` for it
pub const DEFAULT_DURATION: f64 = 1.0;

/// Note velocity when the input has no `velocity` for it
pub const DEFAULT_VELOCITY: u8 = 80;

/// Number of MIDI channels; note tracks wrap around them
pub const MIDI_CHANNELS: u32 = 16;

/// A single timeline event
///
/// `time` is measured in quarters of a quarter note (four units per beat).
/// Serialized with a `type` tag and camelCase fields so the JSON matches what
/// the player front end consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    Tempo {
        time: f64,
        bpm: f64,
    },

    TimeSig {
        time: f64,
        numerator: u8,
        denominator: u8,
    },

    KeySig {
        time: f64,
        key: KeySignature,
    },

    Text {
        time: f64,
        text: String,
    },

    Note {
        track_index: u32,
        /// Always `track_index % 16`
        channel: u8,
        midinote: u8,
        time: f64,
        duration: f64,
        velocity: u8,
    },
}

impl Event {
    /// Create a note, deriving the channel from the track index
    pub fn note(track_index: u32, midinote: u8, time: f64, duration: f64, velocity: u8) -> Self {
        Event::Note {
            track_index,
            channel: channel_for_track(track_index),
            midinote,
            time,
            duration,
            velocity,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Event::Tempo { time, .. }
            | Event::TimeSig { time, .. }
            | Event::KeySig { time, .. }
            | Event::Text { time, .. }
            | Event::Note { time, .. } => *time,
        }
    }

    /// Tie-break rank for events sharing a time: tempo, then the other meta
    /// events, then notes
    pub fn priority(&self) -> u8 {
        match self {
            Event::Tempo { .. } => 0,
            Event::TimeSig { .. } | Event::KeySig { .. } | Event::Text { .. } => 1,
            Event::Note { .. } => 2,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Tempo { .. } => "tempo",
            Event::TimeSig { .. } => "timeSig",
            Event::KeySig { .. } => "keySig",
            Event::Text { .. } => "text",
            Event::Note { .. } => "note",
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Event::Note { .. })
    }
}

pub fn channel_for_track(track_index: u32) -> u8 {
    (track_index % MIDI_CHANNELS) as u8
}

/// Sort by time, then by [`Event::priority`]; equal keys keep their order
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.time()
            .total_cmp(&b.time())
            .then(a.priority().cmp(&b.priority()))
    });
}
