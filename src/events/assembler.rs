// Timeline assembler
// Turns classified buckets into a sorted, defaulted event list

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::explainability::{BucketDecision, BucketOutcome, TimingSource};
use super::types::{
    sort_events, Event, DEFAULT_BPM, DEFAULT_DURATION, DEFAULT_TIME_SIGNATURE, DEFAULT_VELOCITY,
};
use crate::features::{BucketMap, BucketRole, MetreBucket, NoteBucket, TempoBucket, TimingArrays};

/// Events plus the decisions made for each bucket, in bucket order. A metre
/// bucket that also carries pitches gets one decision for each part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub events: Vec<Event>,
    pub decisions: Vec<BucketDecision>,
}

impl Assembly {
    pub fn skipped(&self) -> impl Iterator<Item = &BucketDecision> {
        self.decisions.iter().filter(|d| d.is_skipped())
    }

    /// Number of note tracks that received at least one note
    pub fn track_count(&self) -> usize {
        let mut tracks: Vec<u32> = self
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Note { track_index, .. } => Some(*track_index),
                _ => None,
            })
            .collect();
        tracks.sort_unstable();
        tracks.dedup();
        tracks.len()
    }
}

/// Assemble the event timeline from grouped buckets
pub fn assemble(buckets: &BucketMap) -> Vec<Event> {
    assemble_with_report(buckets).events
}

/// Assemble the timeline and report what happened to each bucket.
///
/// Pass 1 emits metre and tempo events and builds a per-root pool of
/// timelines. Pass 2 emits notes, borrowing a pooled timeline of the same
/// length when a note bucket has no `time` of its own. Buckets that find no
/// timeline are skipped with a warning.
pub fn assemble_with_report(buckets: &BucketMap) -> Assembly {
    let mut events = Vec::new();
    let mut decisions: Vec<Vec<BucketDecision>> = vec![Vec::new(); buckets.len()];
    let mut pools: HashMap<&str, Vec<(&str, TimingArrays<'_>)>> = HashMap::new();
    let mut clamped = 0usize;

    // Pass 1: metre, tempo, and timing pools
    for (i, bucket) in buckets.iter().enumerate() {
        if let Some(timing) = bucket.timing_candidate() {
            pools
                .entry(bucket.root.as_str())
                .or_default()
                .push((bucket.prefix.as_str(), timing));
        }

        let outcome = match &bucket.role {
            BucketRole::Metre { metre, .. } => BucketOutcome::Metre {
                signatures: push_time_signatures(&mut events, metre, &mut clamped),
            },
            BucketRole::Tempo(tempo) => BucketOutcome::Tempo {
                changes: push_tempo_changes(&mut events, tempo, &mut clamped),
            },
            BucketRole::IncompleteMetre { reason, .. } => {
                log::warn!("Metre bucket {} ignored: {}", bucket.prefix, reason);
                BucketOutcome::Skipped {
                    reason: format!("incomplete metre ({})", reason),
                }
            }
            BucketRole::Timing(_) => BucketOutcome::Pooled,
            BucketRole::Inert => BucketOutcome::Skipped {
                reason: "no pitch, time, or numerator field".to_string(),
            },
            BucketRole::Note(_) => continue,
        };

        decisions[i].push(BucketDecision::new(&bucket.prefix, bucket.role.name(), outcome));
    }

    // Pass 2: notes, including those riding on metre buckets
    let mut next_track: u32 = 0;
    for (i, bucket) in buckets.iter().enumerate() {
        let Some(note) = bucket.role.notes() else {
            continue;
        };

        let resolved = resolve_timing(note, pools.get(bucket.root.as_str()).map(Vec::as_slice));
        let outcome = match resolved {
            Some((timing, source)) => {
                if source == TimingSource::Own && timing.time.len() != note.pitch.len() {
                    log::warn!(
                        "Note bucket {} has {} pitches but {} times; extra entries ignored",
                        bucket.prefix,
                        note.pitch.len(),
                        timing.time.len()
                    );
                }

                let track_index = next_track;
                next_track += 1;
                let notes = push_notes(&mut events, track_index, &note.pitch, timing, &mut clamped);

                BucketOutcome::Notes {
                    track_index,
                    notes,
                    timing: source,
                }
            }
            None => {
                log::warn!(
                    "No matching time[] for pitch bucket {}; skipped.",
                    bucket.prefix
                );
                BucketOutcome::Skipped {
                    reason: format!(
                        "no time array of length {} under root {}",
                        note.pitch.len(),
                        bucket.root
                    ),
                }
            }
        };

        decisions[i].push(BucketDecision::new(&bucket.prefix, "note", outcome));
    }

    if clamped > 0 {
        log::warn!("Clamped {} negative time value(s) to 0", clamped);
    }

    // Defaults at t = 0
    if !events.iter().any(|e| matches!(e, Event::Tempo { .. })) {
        events.push(Event::Tempo {
            time: 0.0,
            bpm: DEFAULT_BPM,
        });
    }
    if !events.iter().any(|e| matches!(e, Event::TimeSig { .. })) {
        let (numerator, denominator) = DEFAULT_TIME_SIGNATURE;
        events.push(Event::TimeSig {
            time: 0.0,
            numerator,
            denominator,
        });
    }

    sort_events(&mut events);
    collapse_repeated_time_signatures(&mut events);

    log::debug!(
        "Assembled {} events across {} note tracks",
        events.len(),
        next_track
    );

    Assembly {
        events,
        decisions: decisions.into_iter().flatten().collect(),
    }
}

/// Own `time` first, else the first pooled timeline with one entry per pitch
fn resolve_timing<'a>(
    note: &'a NoteBucket,
    pool: Option<&[(&'a str, TimingArrays<'a>)]>,
) -> Option<(TimingArrays<'a>, TimingSource)> {
    if let Some(time) = &note.time {
        let own = TimingArrays {
            time,
            duration: note.duration.as_deref(),
            velocity: note.velocity.as_deref(),
        };
        return Some((own, TimingSource::Own));
    }

    let (prefix, candidate) = pool?
        .iter()
        .find(|(_, candidate)| candidate.time.len() == note.pitch.len())?;

    let borrowed = TimingArrays {
        time: candidate.time,
        duration: note.duration.as_deref().or(candidate.duration),
        velocity: note.velocity.as_deref().or(candidate.velocity),
    };
    Some((
        borrowed,
        TimingSource::Borrowed {
            prefix: prefix.to_string(),
        },
    ))
}

fn push_notes(
    events: &mut Vec<Event>,
    track_index: u32,
    pitch: &[f64],
    timing: TimingArrays<'_>,
    clamped: &mut usize,
) -> usize {
    let count = pitch.len().min(timing.time.len());

    for i in 0..count {
        let duration = timing
            .duration
            .and_then(|d| d.get(i))
            .copied()
            .unwrap_or(DEFAULT_DURATION);
        let velocity = timing
            .velocity
            .and_then(|v| v.get(i))
            .map(|&v| to_seven_bit(v))
            .unwrap_or(DEFAULT_VELOCITY);

        events.push(Event::note(
            track_index,
            to_seven_bit(pitch[i]),
            non_negative(timing.time[i], clamped),
            duration,
            velocity,
        ));
    }

    count
}

/// Returns how many signatures the bucket listed; repeats collapse later
fn push_time_signatures(events: &mut Vec<Event>, metre: &MetreBucket, clamped: &mut usize) -> usize {
    for ((&time, &numerator), &denominator) in metre
        .time
        .iter()
        .zip(&metre.numerator)
        .zip(&metre.denominator)
    {
        events.push(Event::TimeSig {
            time: non_negative(time, clamped),
            numerator: to_byte(numerator),
            denominator: to_byte(denominator),
        });
    }

    metre.time.len()
}

/// Drop a `TimeSig` identical to the one right before it in sorted order
fn collapse_repeated_time_signatures(events: &mut Vec<Event>) {
    let before = events.len();
    events.dedup_by(|next, prev| matches!(prev, Event::TimeSig { .. }) && next == prev);

    if events.len() < before {
        log::debug!("Collapsed {} repeated time signature(s)", before - events.len());
    }
}

fn push_tempo_changes(events: &mut Vec<Event>, tempo: &TempoBucket, clamped: &mut usize) -> usize {
    for (&time, &bpm) in tempo.time.iter().zip(&tempo.bpm) {
        events.push(Event::Tempo {
            time: non_negative(time, clamped),
            bpm,
        });
    }
    tempo.time.len().min(tempo.bpm.len())
}

fn to_seven_bit(value: f64) -> u8 {
    value.round().clamp(0.0, 127.0) as u8
}

fn to_byte(value: f64) -> u8 {
    value.round().clamp(1.0, 255.0) as u8
}

fn non_negative(time: f64, clamped: &mut usize) -> f64 {
    if time < 0.0 {
        *clamped += 1;
        0.0
    } else {
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{group, FlattenedRecord};

    fn buckets(records: &[(&str, &[f64])]) -> BucketMap {
        let records: Vec<FlattenedRecord> = records
            .iter()
            .map(|(path, data)| FlattenedRecord::new(path, data.to_vec()))
            .collect();
        group(&records)
    }

    fn notes(events: &[Event]) -> Vec<&Event> {
        events.iter().filter(|e| e.is_note()).collect()
    }

    #[test]
    fn test_same_prefix_grouping() {
        let events = assemble(&buckets(&[
            ("A/n0/pitch", &[60.0, 62.0]),
            ("A/n0/time", &[0.0, 1.0]),
        ]));

        let notes = notes(&events);
        assert_eq!(notes.len(), 2);
        assert_eq!(*notes[0], Event::note(0, 60, 0.0, 1.0, 80));
        assert_eq!(*notes[1], Event::note(0, 62, 1.0, 1.0, 80));
    }

    #[test]
    fn test_defaults_injected_once() {
        let events = assemble(&buckets(&[("A/pitch", &[60.0]), ("A/time", &[0.0])]));

        let tempos: Vec<&Event> = events.iter().filter(|e| matches!(e, Event::Tempo { .. })).collect();
        let sigs: Vec<&Event> = events.iter().filter(|e| matches!(e, Event::TimeSig { .. })).collect();
        assert_eq!(tempos, vec![&Event::Tempo { time: 0.0, bpm: 120.0 }]);
        assert_eq!(
            sigs,
            vec![&Event::TimeSig { time: 0.0, numerator: 4, denominator: 4 }]
        );
        assert_eq!(events[0].kind_name(), "tempo");
        assert_eq!(events[1].kind_name(), "timeSig");
    }

    #[test]
    fn test_empty_input_yields_only_defaults() {
        let events = assemble(&BucketMap::default());
        assert_eq!(
            events,
            vec![
                Event::Tempo { time: 0.0, bpm: 120.0 },
                Event::TimeSig { time: 0.0, numerator: 4, denominator: 4 },
            ]
        );
    }

    #[test]
    fn test_metre_dedup_and_no_default() {
        let events = assemble(&buckets(&[
            ("S/metre/time", &[0.0, 0.0, 16.0]),
            ("S/metre/numerator", &[3.0, 3.0, 6.0]),
            ("S/metre/denominator", &[4.0, 4.0, 8.0]),
        ]));

        let sigs: Vec<&Event> = events.iter().filter(|e| matches!(e, Event::TimeSig { .. })).collect();
        assert_eq!(
            sigs,
            vec![
                &Event::TimeSig { time: 0.0, numerator: 3, denominator: 4 },
                &Event::TimeSig { time: 16.0, numerator: 6, denominator: 8 },
            ]
        );
    }

    #[test]
    fn test_metre_bucket_not_pooled() {
        let report = assemble_with_report(&buckets(&[
            ("S/metre/time", &[0.0]),
            ("S/metre/numerator", &[4.0]),
            ("S/metre/denominator", &[4.0]),
            ("S/pitch", &[60.0]),
        ]));

        assert!(notes(&report.events).is_empty());
        assert_eq!(report.skipped().count(), 1);
    }

    #[test]
    fn test_repeated_signatures_collapse_after_sorting() {
        let report = assemble_with_report(&buckets(&[
            ("S/metre/time", &[0.0, 16.0, 0.0]),
            ("S/metre/numerator", &[3.0, 6.0, 3.0]),
            ("S/metre/denominator", &[4.0, 8.0, 4.0]),
        ]));

        let sigs: Vec<&Event> = report
            .events
            .iter()
            .filter(|e| matches!(e, Event::TimeSig { .. }))
            .collect();
        assert_eq!(
            sigs,
            vec![
                &Event::TimeSig { time: 0.0, numerator: 3, denominator: 4 },
                &Event::TimeSig { time: 16.0, numerator: 6, denominator: 8 },
            ]
        );
    }

    #[test]
    fn test_metre_bucket_with_pitches_emits_both() {
        let report = assemble_with_report(&buckets(&[
            ("A/pitch", &[60.0, 62.0]),
            ("A/time", &[0.0, 4.0]),
            ("A/numerator", &[3.0, 3.0]),
            ("A/denominator", &[4.0, 4.0]),
        ]));

        let notes = notes(&report.events);
        assert_eq!(notes.len(), 2);
        assert_eq!(*notes[0], Event::note(0, 60, 0.0, 1.0, 80));
        assert_eq!(*notes[1], Event::note(0, 62, 4.0, 1.0, 80));

        let sigs = report
            .events
            .iter()
            .filter(|e| matches!(e, Event::TimeSig { numerator: 3, .. }))
            .count();
        assert_eq!(sigs, 2);

        let roles: Vec<(&str, &str)> = report
            .decisions
            .iter()
            .map(|d| (d.prefix.as_str(), d.role.as_str()))
            .collect();
        assert_eq!(roles, vec![("A", "metre"), ("A", "note")]);
    }

    #[test]
    fn test_tempo_bucket_offers_timeline() {
        let report = assemble_with_report(&buckets(&[
            ("A/pitch", &[60.0]),
            ("A/tempo/time", &[2.0]),
            ("A/tempo/bpm", &[90.0]),
        ]));

        let notes = notes(&report.events);
        assert_eq!(notes.len(), 1);
        assert_eq!(*notes[0], Event::note(0, 60, 2.0, 1.0, 80));
        assert!(report.events.contains(&Event::Tempo { time: 2.0, bpm: 90.0 }));

        assert_eq!(
            report.decisions[0].outcome,
            BucketOutcome::Notes {
                track_index: 0,
                notes: 1,
                timing: TimingSource::Borrowed {
                    prefix: "A/tempo".to_string()
                },
            }
        );
    }

    #[test]
    fn test_pairing_fallback_borrows_pool() {
        let report = assemble_with_report(&buckets(&[
            ("B/pitch", &[60.0, 62.0]),
            ("B/melody/time", &[0.0, 1.0]),
            ("B/melody/duration", &[0.5, 2.0]),
            ("B/melody/velocity", &[100.0, 90.0]),
        ]));

        let notes = notes(&report.events);
        assert_eq!(*notes[0], Event::note(0, 60, 0.0, 0.5, 100));
        assert_eq!(*notes[1], Event::note(0, 62, 1.0, 2.0, 90));

        assert_eq!(
            report.decisions[0].outcome,
            BucketOutcome::Notes {
                track_index: 0,
                notes: 2,
                timing: TimingSource::Borrowed {
                    prefix: "B/melody".to_string()
                },
            }
        );
    }

    #[test]
    fn test_own_duration_preferred_over_borrowed() {
        let events = assemble(&buckets(&[
            ("B/pitch", &[60.0]),
            ("B/duration", &[3.0]),
            ("B/melody/time", &[2.0]),
            ("B/melody/duration", &[0.25]),
        ]));

        assert_eq!(*notes(&events)[0], Event::note(0, 60, 2.0, 3.0, 80));
    }

    #[test]
    fn test_mismatched_pool_skips_bucket() {
        let report = assemble_with_report(&buckets(&[
            ("B/pitch", &[60.0, 62.0]),
            ("B/melody/time", &[0.0, 1.0, 2.0]),
        ]));

        assert!(notes(&report.events).is_empty());
        let skipped: Vec<&BucketDecision> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].prefix, "B");
    }

    #[test]
    fn test_pool_scoped_by_root() {
        let events = assemble(&buckets(&[("B/pitch", &[60.0]), ("C/melody/time", &[0.0])]));
        assert!(notes(&events).is_empty());
    }

    #[test]
    fn test_first_matching_candidate_wins() {
        let report = assemble_with_report(&buckets(&[
            ("B/a/time", &[0.0]),
            ("B/b/time", &[5.0, 6.0]),
            ("B/c/time", &[7.0, 8.0]),
            ("B/pitch", &[60.0, 61.0]),
        ]));

        let notes = notes(&report.events);
        assert_eq!(notes[0].time(), 5.0);
        assert_eq!(notes[1].time(), 6.0);
    }

    #[test]
    fn test_track_indices_follow_bucket_order() {
        let report = assemble_with_report(&buckets(&[
            ("A/v0/pitch", &[60.0]),
            ("A/v0/time", &[4.0]),
            ("A/v1/pitch", &[64.0]),
            ("A/v1/time", &[0.0]),
            ("Z/pitch", &[1.0]),
            ("A/v2/pitch", &[67.0]),
            ("A/v2/time", &[2.0]),
        ]));

        let tracks: Vec<(u8, u32)> = notes(&report.events)
            .iter()
            .filter_map(|e| match e {
                Event::Note { midinote, track_index, .. } => Some((*midinote, *track_index)),
                _ => None,
            })
            .collect();
        // Z is skipped, so v2 gets the third index
        assert_eq!(tracks, vec![(64, 1), (67, 2), (60, 0)]);
        assert_eq!(report.track_count(), 3);
    }

    #[test]
    fn test_ordering_tempo_timesig_note() {
        let events = assemble(&buckets(&[
            ("A/pitch", &[60.0, 62.0]),
            ("A/time", &[4.0, 0.0]),
            ("A/tempo/time", &[4.0]),
            ("A/tempo/bpm", &[90.0]),
            ("A/metre/time", &[4.0]),
            ("A/metre/numerator", &[3.0]),
            ("A/metre/denominator", &[4.0]),
        ]));

        let order: Vec<(&str, f64)> = events.iter().map(|e| (e.kind_name(), e.time())).collect();
        assert_eq!(
            order,
            vec![("note", 0.0), ("tempo", 4.0), ("timeSig", 4.0), ("note", 4.0)]
        );
        // Supplied tempo and metre suppress the t = 0 defaults
        assert!(!events.iter().any(|e| e.time() == 0.0 && !e.is_note()));
    }

    #[test]
    fn test_value_normalization() {
        let events = assemble(&buckets(&[
            ("A/pitch", &[200.0, 59.6]),
            ("A/time", &[-2.0, 1.0]),
            ("A/velocity", &[300.0]),
        ]));

        let notes = notes(&events);
        assert_eq!(*notes[0], Event::note(0, 127, 0.0, 1.0, 127));
        assert_eq!(*notes[1], Event::note(0, 60, 1.0, 1.0, 80));
    }

    #[test]
    fn test_channel_wraps_after_sixteen_tracks() {
        let records: Vec<(String, Vec<f64>)> = (0..17)
            .flat_map(|i| {
                vec![
                    (format!("A/v{}/pitch", i), vec![60.0]),
                    (format!("A/v{}/time", i), vec![0.0]),
                ]
            })
            .collect();
        let records: Vec<FlattenedRecord> = records
            .iter()
            .map(|(p, d)| FlattenedRecord::new(p, d.clone()))
            .collect();

        let events = assemble(&group(&records));
        let last = events.iter().rev().find(|e| e.is_note()).unwrap();
        match last {
            Event::Note { track_index, channel, .. } => {
                assert_eq!(*track_index, 16);
                assert_eq!(*channel, 0);
            }
            _ => unreachable!(),
        }
    }
}
