//! Tick-by-tick traversal of a decoded song's voices.
//!
//! The encoder consumes all voices in lock-step on the shared frame
//! clock. [`timestamp_max`] gives the walk its end: the tick at which the
//! last note of any voice stops sounding. Events timestamped at or past
//! that tick never fire.

use crate::event::{TimedEvent, Track};

/// Tick at which the last sounding note across all voices ends.
pub fn timestamp_max(tracks: &[Track]) -> u64 {
    tracks.iter().map(Track::terminal_tick).max().unwrap_or(0)
}

/// Lock-step cursor over every voice of a song.
///
/// Yields, for each tick up to [`timestamp_max`], one event slice per
/// voice holding exactly the events that fire on that tick.
pub struct TickWalker<'a> {
    tracks: &'a [Track],
    cursors: Vec<usize>,
    tick: u64,
    end: u64,
}

impl<'a> TickWalker<'a> {
    /// Start a walk over `tracks`.
    pub fn new(tracks: &'a [Track]) -> Self {
        Self {
            tracks,
            cursors: vec![0; tracks.len()],
            tick: 0,
            end: timestamp_max(tracks),
        }
    }

    /// Total number of ticks the walk covers.
    pub fn len(&self) -> u64 {
        self.end
    }

    /// Whether the song has no sounding ticks at all.
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }
}

impl<'a> Iterator for TickWalker<'a> {
    type Item = (u64, Vec<&'a [TimedEvent]>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.tick >= self.end {
            return None;
        }
        let tick = self.tick;
        let mut rows = Vec::with_capacity(self.tracks.len());
        for (track, cursor) in self.tracks.iter().zip(self.cursors.iter_mut()) {
            let start = *cursor;
            let mut end = start;
            while end < track.events.len() && track.events[end].tick == tick {
                end += 1;
            }
            *cursor = end;
            rows.push(&track.events[start..end]);
        }
        self.tick += 1;
        Some((tick, rows))
    }
}
