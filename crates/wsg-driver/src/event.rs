//! Canonical, game-agnostic event vocabulary.
//!
//! Every driver front-end lowers its ROM bytecode into this small set of
//! timestamped events. Downstream consumers (the tick-grid merger and the
//! VGM encoder) only ever see these; nothing game-specific survives past
//! this boundary.

/// One musical or configuration event, without its timestamp.
///
/// The enum is closed on purpose: every consumption site matches
/// exhaustively, so adding a kind forces every consumer to decide what to
/// do with it.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Key a note: raw fixed-point frequency code in the driver's native
    /// units, and a duration in ticks. A pitch of zero is a rest (the
    /// previous key is released, nothing new is keyed).
    Note {
        /// Raw pitch register code.
        pitch: u32,
        /// Duration in ticks.
        duration: u32,
    },
    /// Direct volume level, 0..=15.
    Volume {
        /// Level in the chip's native 4-bit range.
        level: u8,
    },
    /// Select a volume-envelope program to drive volume over later ticks.
    VolumeCommand {
        /// Envelope table index.
        envelope: u8,
        /// Raw envelope program bytes, when the driver extracts them.
        envelope_bytes: Vec<u8>,
    },
    /// Select a waveform/instrument slot, 0..=15.
    Wave {
        /// Waveform slot index.
        index: u8,
    },
    /// The song's waveform table: sets of waveforms, each a row of raw
    /// unsigned nibble sample points. Emitted once per song on track 0.
    Wavetable {
        /// `samples[set][point]`, each point 0..=15.
        samples: Vec<Vec<u8>>,
    },
    /// Native sample rate of the pitch accumulator, in Hz.
    SampleRate {
        /// Rate in Hz.
        hz: u32,
    },
    /// Tick (frame) rate of the song, in Hz.
    FrameRate {
        /// Rate in Hz (fractional for the original video timing).
        hz: f64,
    },
    /// Bit width of the pitch accumulator for this track.
    RegisterSize {
        /// 16 or 20 on the supported hardware.
        bits: u8,
    },
    /// Global duration multiplier change (informational).
    DurationMultiplier {
        /// New multiplier.
        factor: u32,
    },
}

/// An [`Event`] pinned to a tick on the song's frame clock.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    /// Tick at which the event takes effect.
    pub tick: u64,
    /// The event payload.
    pub event: Event,
}

/// Ordered event sequence for one voice.
///
/// Ticks are non-decreasing; events sharing a tick keep insertion order
/// (a volume change logically follows the note that caused it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    /// The events, in emission order.
    pub events: Vec<TimedEvent>,
}

impl Track {
    /// Create an empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at `tick`.
    pub fn push(&mut self, tick: u64, event: Event) {
        debug_assert!(
            self.events.last().map_or(true, |last| last.tick <= tick),
            "event ticks must be non-decreasing"
        );
        self.events.push(TimedEvent { tick, event });
    }

    /// Tick at which the last note of this track stops sounding, i.e. its
    /// timestamp plus duration. Zero for a track without notes.
    pub fn terminal_tick(&self) -> u64 {
        for timed in self.events.iter().rev() {
            if let Event::Note { duration, .. } = timed.event {
                return timed.tick + u64::from(duration);
            }
        }
        0
    }
}

/// A decoded song: per-voice tracks sharing one tick clock, plus the loop
/// settings resolved from per-song configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    /// One track per voice, in voice order.
    pub tracks: Vec<Track>,
    /// Tick the song loops back to, when `looped` is set.
    pub loop_tick: u64,
    /// Whether the song loops at all.
    pub looped: bool,
}

impl Song {
    /// Build a song from decoded tracks with looping disabled.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            loop_tick: 0,
            looped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_tick_uses_last_note() {
        let mut track = Track::new();
        track.push(0, Event::Volume { level: 8 });
        track.push(
            0,
            Event::Note {
                pitch: 0x1000,
                duration: 4,
            },
        );
        track.push(
            4,
            Event::Note {
                pitch: 0,
                duration: 2,
            },
        );
        track.push(5, Event::Volume { level: 0 });
        assert_eq!(track.terminal_tick(), 6);
    }

    #[test]
    fn terminal_tick_without_notes_is_zero() {
        let mut track = Track::new();
        track.push(0, Event::Wave { index: 3 });
        assert_eq!(track.terminal_tick(), 0);
    }
}
