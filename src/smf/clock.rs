// Tick clock
// Converts fractional timeline positions into integer MIDI ticks

/// Default file resolution (ticks per quarter note)
pub const DEFAULT_PPQ: u16 = 960;

/// Timeline units per quarter note; input times count quarters of a beat
pub const TIME_UNITS_PER_QUARTER: f64 = 4.0;

/// Convert a timeline position to an absolute tick: `round(ppq * time / 4)`.
///
/// Negative positions saturate to tick 0.
pub fn to_tick(time: f64, ppq: u16) -> u32 {
    (f64::from(ppq) * time / TIME_UNITS_PER_QUARTER).round() as u32
}

/// Tick converter bound to one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    ppq: u16,
}

impl TickClock {
    pub fn new(ppq: u16) -> Self {
        TickClock { ppq }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn to_tick(&self, time: f64) -> u32 {
        to_tick(time, self.ppq)
    }

    /// Note-on and note-off ticks.
    ///
    /// The off tick rounds the absolute end position `time + duration`, so it
    /// never drifts from the on tick by more than the duration's own rounding.
    pub fn note_span(&self, time: f64, duration: f64) -> (u32, u32) {
        (self.to_tick(time), self.to_tick(time + duration))
    }
}

impl Default for TickClock {
    fn default() -> Self {
        TickClock::new(DEFAULT_PPQ)
    }
}
