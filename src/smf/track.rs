// Track builder
// Accumulates events at absolute ticks and serializes them as SMF delta times

use midly::num::{u15, u28};
use midly::{Format, Header, MetaMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use super::encoder::{EncodeError, EncodeResult};

/// Largest delta time a variable-length quantity can carry
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Largest metrical division the header can carry
pub const MAX_PPQ: u16 = 0x7FFF;

/// One track's events, keyed by absolute tick
#[derive(Debug, Clone, Default)]
pub struct TrackBuilder<'a> {
    events: Vec<(u32, TrackEventKind<'a>)>,
}

impl<'a> TrackBuilder<'a> {
    pub fn new() -> Self {
        TrackBuilder { events: Vec::new() }
    }

    /// Add an event at an absolute tick; events sharing a tick keep the order
    /// they were appended in
    pub fn append_at_tick(&mut self, tick: u32, kind: TrackEventKind<'a>) {
        self.events.push((tick, kind));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn max_tick(&self) -> Option<u32> {
        self.events.iter().map(|(tick, _)| *tick).max()
    }

    /// Finish the track with an end-of-track marker at `end_tick`, converting
    /// absolute ticks to delta times. Fails when a gap between consecutive
    /// events is too wide for a delta time.
    pub fn into_track(mut self, end_tick: u32) -> EncodeResult<Track<'a>> {
        // Stable sort keeps same-tick events in append order
        self.events.sort_by_key(|(tick, _)| *tick);

        let mut track = Track::with_capacity(self.events.len() + 1);
        let mut last_tick = 0;
        for (tick, kind) in self.events {
            track.push(TrackEvent {
                delta: delta_between(last_tick, tick)?,
                kind,
            });
            last_tick = tick;
        }

        track.push(TrackEvent {
            delta: delta_between(last_tick, end_tick)?,
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        Ok(track)
    }
}

fn delta_between(from: u32, to: u32) -> EncodeResult<u28> {
    let delta = to.saturating_sub(from);
    if delta > MAX_DELTA {
        return Err(EncodeError::DeltaOverflow { tick: to, delta });
    }
    Ok(u28::new(delta))
}

/// Write a Type-1 (parallel) file with the given division and tracks
pub fn serialize(ppq: u16, tracks: Vec<Track<'_>>) -> std::io::Result<Vec<u8>> {
    let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(ppq.min(MAX_PPQ))));
    let smf = Smf { header, tracks };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}
