// SMF encoder
// Renders an event timeline as a Type-1 Standard MIDI File

use midly::num::{u24, u4, u7};
use midly::{MetaMessage, MidiMessage, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::clock::{TickClock, DEFAULT_PPQ};
use super::track::{serialize, TrackBuilder, MAX_PPQ};
use crate::events::Event;

/// MIDI clocks per metronome click (one quarter note)
const CLOCKS_PER_CLICK: u8 = 24;

/// 32nd notes per quarter note
const THIRTY_SECONDS_PER_QUARTER: u8 = 8;

/// Largest tempo value a set-tempo meta event can carry
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("PPQ must be between 1 and {max}, got {0}", max = MAX_PPQ)]
    InvalidPpq(u16),

    /// A note refers to a track that was never registered. Indicates a bug
    /// in the encoder, not bad input.
    #[error("Internal error: note references unregistered track {0}")]
    UnregisteredTrack(u32),

    /// Time is too far past the previous event on its track for a
    /// variable-length delta.
    #[error("Event at tick {tick} is {delta} ticks after the previous one, beyond the largest delta time")]
    DeltaOverflow { tick: u32, delta: u32 },

    #[error("Failed to write MIDI: {0}")]
    Io(#[from] std::io::Error),
}

pub type EncodeResult<T> = Result<T, EncodeError>;

/// MIDI export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ)
    pub ppq: u16,

    /// Sequence name written on the conductor track; empty to omit
    pub sequence_name: String,

    /// Name each note track "Instrument N"
    pub instrument_names: bool,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: DEFAULT_PPQ,
            sequence_name: "PTtoMIDI".to_string(),
            instrument_names: true,
        }
    }
}

impl MidiExportOptions {
    pub fn with_ppq(ppq: u16) -> Self {
        MidiExportOptions {
            ppq,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> EncodeResult<()> {
        if self.ppq == 0 || self.ppq > MAX_PPQ {
            return Err(EncodeError::InvalidPpq(self.ppq));
        }
        Ok(())
    }
}

/// Encode events at the given resolution with default options
pub fn encode(events: &[Event], ppq: u16) -> EncodeResult<Vec<u8>> {
    encode_with_options(events, &MidiExportOptions::with_ppq(ppq))
}

/// Encode events as a Type-1 Standard MIDI File.
///
/// Track 0 is the conductor and carries every meta event. Each distinct
/// `track_index` among the notes gets its own track, in order of first
/// appearance. Every track ends one tick after the last tick used anywhere in
/// the file. Input is not validated musically; events are written as given.
pub fn encode_with_options(events: &[Event], options: &MidiExportOptions) -> EncodeResult<Vec<u8>> {
    options.validate()?;
    let clock = TickClock::new(options.ppq);

    // Register note tracks up front so names outlive the builders
    let mut track_order: Vec<u32> = Vec::new();
    let mut slots: HashMap<u32, usize> = HashMap::new();
    for event in events {
        if let Event::Note { track_index, .. } = event {
            slots.entry(*track_index).or_insert_with(|| {
                track_order.push(*track_index);
                track_order.len() - 1
            });
        }
    }
    let instrument_names: Vec<String> = track_order
        .iter()
        .map(|index| format!("Instrument {}", index + 1))
        .collect();

    let mut conductor = TrackBuilder::new();
    if !options.sequence_name.is_empty() {
        conductor.append_at_tick(
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(options.sequence_name.as_bytes())),
        );
    }

    let mut note_tracks: Vec<TrackBuilder> = instrument_names
        .iter()
        .map(|name| {
            let mut track = TrackBuilder::new();
            if options.instrument_names {
                track.append_at_tick(
                    0,
                    TrackEventKind::Meta(MetaMessage::InstrumentName(name.as_bytes())),
                );
            }
            track
        })
        .collect();

    let mut max_tick = 0u32;
    for event in events {
        let tick = clock.to_tick(event.time());
        max_tick = max_tick.max(tick);

        match event {
            Event::Tempo { bpm, .. } => conductor.append_at_tick(
                tick,
                TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter(*bpm)))),
            ),
            Event::TimeSig {
                numerator,
                denominator,
                ..
            } => conductor.append_at_tick(
                tick,
                TrackEventKind::Meta(MetaMessage::TimeSignature(
                    *numerator,
                    denominator_exponent(*denominator),
                    CLOCKS_PER_CLICK,
                    THIRTY_SECONDS_PER_QUARTER,
                )),
            ),
            Event::KeySig { key, .. } => conductor.append_at_tick(
                tick,
                TrackEventKind::Meta(MetaMessage::KeySignature(key.sharps, key.minor)),
            ),
            Event::Text { text, .. } => conductor.append_at_tick(
                tick,
                TrackEventKind::Meta(MetaMessage::Text(text.as_bytes())),
            ),
            Event::Note {
                track_index,
                channel,
                midinote,
                time,
                duration,
                velocity,
            } => {
                let slot = *slots
                    .get(track_index)
                    .ok_or(EncodeError::UnregisteredTrack(*track_index))?;
                let track = &mut note_tracks[slot];

                let (on_tick, off_tick) = clock.note_span(*time, *duration);
                max_tick = max_tick.max(off_tick);

                let channel = u4::new(channel & 0x0F);
                let key = u7::new((*midinote).min(127));
                track.append_at_tick(
                    on_tick,
                    TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOn {
                            key,
                            vel: u7::new((*velocity).min(127)),
                        },
                    },
                );
                track.append_at_tick(
                    off_tick,
                    TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOff {
                            key,
                            vel: u7::new(0),
                        },
                    },
                );
            }
        }
    }

    // One tick of headroom past the last event or note-off in the file
    let end_tick = max_tick.saturating_add(1);

    let mut tracks = Vec::with_capacity(note_tracks.len() + 1);
    tracks.push(conductor.into_track(end_tick)?);
    for track in note_tracks {
        tracks.push(track.into_track(end_tick)?);
    }

    log::debug!(
        "Encoding {} events into {} tracks at {} PPQ (end tick {})",
        events.len(),
        tracks.len(),
        options.ppq,
        end_tick
    );

    Ok(serialize(options.ppq, tracks)?)
}

/// Microseconds per quarter note, clamped to what a 24-bit field holds
fn micros_per_quarter(bpm: f64) -> u32 {
    if bpm <= 0.0 || bpm.is_nan() {
        return MAX_TEMPO_MICROS;
    }
    (60_000_000.0 / bpm).round().clamp(1.0, MAX_TEMPO_MICROS as f64) as u32
}

/// Time-signature denominator as a power-of-two exponent (4 -> 2, 8 -> 3)
fn denominator_exponent(denominator: u8) -> u8 {
    if denominator <= 1 {
        return 0;
    }
    f64::from(denominator).log2().round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeySignature;
    use midly::{Smf, Track};

    fn parse(bytes: &[u8]) -> Smf<'_> {
        Smf::parse(bytes).unwrap()
    }

    /// (absolute tick, kind) pairs of one parsed track
    fn absolute<'a>(track: &Track<'a>) -> Vec<(u32, TrackEventKind<'a>)> {
        let mut tick = 0;
        track
            .iter()
            .map(|e| {
                tick += e.delta.as_int();
                (tick, e.kind)
            })
            .collect()
    }

    fn basic_events() -> Vec<Event> {
        vec![
            Event::Tempo { time: 0.0, bpm: 120.0 },
            Event::TimeSig { time: 0.0, numerator: 4, denominator: 4 },
            Event::note(0, 60, 0.0, 1.0, 80),
            Event::note(0, 62, 1.0, 0.5, 90),
            Event::note(1, 48, 4.0, 4.0, 70),
        ]
    }

    #[test]
    fn test_micros_per_quarter() {
        assert_eq!(micros_per_quarter(120.0), 500_000);
        assert_eq!(micros_per_quarter(60.0), 1_000_000);
        assert_eq!(micros_per_quarter(0.0), MAX_TEMPO_MICROS);
        assert_eq!(micros_per_quarter(1.0), MAX_TEMPO_MICROS);
    }

    #[test]
    fn test_denominator_exponent() {
        assert_eq!(denominator_exponent(4), 2);
        assert_eq!(denominator_exponent(8), 3);
        assert_eq!(denominator_exponent(2), 1);
        assert_eq!(denominator_exponent(1), 0);
    }

    #[test]
    fn test_header_and_track_count() {
        let bytes = encode(&basic_events(), 960).unwrap();
        let smf = parse(&bytes);

        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert_eq!(smf.header.timing, midly::Timing::Metrical(midly::num::u15::new(960)));
        // conductor + two note tracks
        assert_eq!(smf.tracks.len(), 3);
    }

    #[test]
    fn test_conductor_meta_events() {
        let bytes = encode(&basic_events(), 960).unwrap();
        let smf = parse(&bytes);
        let conductor = absolute(&smf.tracks[0]);

        assert_eq!(
            conductor[0],
            (0, TrackEventKind::Meta(MetaMessage::TrackName(b"PTtoMIDI")))
        );
        assert_eq!(
            conductor[1],
            (0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))))
        );
        assert_eq!(
            conductor[2],
            (0, TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)))
        );
    }

    #[test]
    fn test_note_on_off_pairs() {
        let bytes = encode(&basic_events(), 960).unwrap();
        let smf = parse(&bytes);
        let track = absolute(&smf.tracks[1]);

        assert_eq!(
            track[0],
            (0, TrackEventKind::Meta(MetaMessage::InstrumentName(b"Instrument 1")))
        );

        let notes: Vec<(u32, u8, u8, bool)> = track
            .iter()
            .filter_map(|(tick, kind)| match kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { key, vel }, .. } => {
                    Some((*tick, key.as_int(), vel.as_int(), true))
                }
                TrackEventKind::Midi { message: MidiMessage::NoteOff { key, vel }, .. } => {
                    Some((*tick, key.as_int(), vel.as_int(), false))
                }
                _ => None,
            })
            .collect();

        assert_eq!(
            notes,
            vec![
                (0, 60, 80, true),
                (240, 60, 0, false),
                (240, 62, 90, true),
                (360, 62, 0, false),
            ]
        );
    }

    #[test]
    fn test_channel_taken_from_event() {
        let bytes = encode(&[Event::note(17, 60, 0.0, 1.0, 80)], 960).unwrap();
        let smf = parse(&bytes);
        let track = absolute(&smf.tracks[1]);

        let channels: Vec<u8> = track
            .iter()
            .filter_map(|(_, kind)| match kind {
                TrackEventKind::Midi { channel, .. } => Some(channel.as_int()),
                _ => None,
            })
            .collect();
        assert_eq!(channels, vec![1, 1]);
        assert_eq!(
            track[0].1,
            TrackEventKind::Meta(MetaMessage::InstrumentName(b"Instrument 18"))
        );
    }

    #[test]
    fn test_end_of_track_on_every_track() {
        let bytes = encode(&basic_events(), 960).unwrap();
        let smf = parse(&bytes);

        // last note-off: round(960 * 8 / 4) = 1920
        for track in &smf.tracks {
            let events = absolute(track);
            let (tick, kind) = events.last().unwrap();
            assert_eq!(*kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
            assert_eq!(*tick, 1921);
        }
    }

    #[test]
    fn test_end_of_track_follows_late_meta_event() {
        let events = vec![
            Event::note(0, 60, 0.0, 1.0, 80),
            Event::Text { time: 40.0, text: "coda".to_string() },
        ];
        let bytes = encode(&events, 960).unwrap();
        let smf = parse(&bytes);

        for track in &smf.tracks {
            assert_eq!(absolute(track).last().unwrap().0, 9601);
        }
    }

    #[test]
    fn test_key_signature_and_text() {
        let events = vec![
            Event::KeySig { time: 0.0, key: "Ebm".parse::<KeySignature>().unwrap() },
            Event::Text { time: 2.0, text: "verse".to_string() },
        ];
        let bytes = encode(&events, 960).unwrap();
        let smf = parse(&bytes);
        let conductor = absolute(&smf.tracks[0]);

        assert_eq!(smf.tracks.len(), 1);
        assert_eq!(
            conductor[1],
            (0, TrackEventKind::Meta(MetaMessage::KeySignature(-6, true)))
        );
        assert_eq!(
            conductor[2],
            (480, TrackEventKind::Meta(MetaMessage::Text(b"verse")))
        );
    }

    #[test]
    fn test_multi_byte_delta() {
        // Tempo change at tick 240 (>= 128) needs a two-byte delta
        let events = vec![
            Event::Tempo { time: 0.0, bpm: 120.0 },
            Event::Tempo { time: 1.0, bpm: 60.0 },
            Event::Tempo { time: 1.5, bpm: 90.0 },
        ];
        let options = MidiExportOptions {
            sequence_name: String::new(),
            ..Default::default()
        };
        let bytes = encode_with_options(&events, &options).unwrap();

        // MThd (14 bytes) + "MTrk" + length
        let body = &bytes[22..];
        assert_eq!(&body[0..7], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        // delta 240 = 0x81 0x70
        assert_eq!(&body[7..14], &[0x81, 0x70, 0xFF, 0x51, 0x03, 0x0F, 0x42]);
        assert_eq!(body[14], 0x40);
        // delta 120 fits in one byte
        assert_eq!(&body[15..19], &[0x78, 0xFF, 0x51, 0x03]);
        // end of track one tick after 360
        assert_eq!(&body[22..26], &[0x01, 0xFF, 0x2F, 0x00]);
        assert_eq!(body.len(), 26);
    }

    #[test]
    fn test_negative_duration_is_written_as_given() {
        let bytes = encode(&[Event::note(0, 60, 4.0, -2.0, 80)], 960).unwrap();
        let smf = parse(&bytes);
        let track = absolute(&smf.tracks[1]);

        // note-off sorts before its note-on at tick 480
        assert!(matches!(
            track[1],
            (480, TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. })
        ));
        assert!(matches!(
            track[2],
            (960, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. })
        ));
    }

    #[test]
    fn test_without_names() {
        let options = MidiExportOptions {
            sequence_name: String::new(),
            instrument_names: false,
            ..Default::default()
        };
        let bytes = encode_with_options(&[Event::note(0, 60, 0.0, 1.0, 80)], &options).unwrap();
        let smf = parse(&bytes);

        assert_eq!(smf.tracks[0].len(), 1);
        assert!(matches!(
            smf.tracks[1][0].kind,
            TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }
        ));
    }

    #[test]
    fn test_invalid_ppq() {
        assert!(matches!(encode(&[], 0), Err(EncodeError::InvalidPpq(0))));
        assert!(matches!(encode(&[], 0x8000), Err(EncodeError::InvalidPpq(0x8000))));
    }

    #[test]
    fn test_time_beyond_delta_range_is_an_error() {
        // round(960 * 1.2e6 / 4) = 288_000_000 ticks, past the 28-bit delta limit
        let events = vec![Event::note(0, 60, 1.2e6, 1.0, 80)];
        assert!(matches!(
            encode(&events, 960),
            Err(EncodeError::DeltaOverflow { delta, .. }) if delta > 0x0FFF_FFFF
        ));

        // The same moment fits at a coarser resolution
        assert!(encode(&events, 96).is_ok());
    }

    #[test]
    fn test_deterministic_output() {
        let first = encode(&basic_events(), 960).unwrap();
        let second = encode(&basic_events(), 960).unwrap();
        assert_eq!(first, second);
    }
}
