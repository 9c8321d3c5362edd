//! Timestamped open/closed state per sensor.
//!
//! Each sensor keeps only the last time it reported open and the last time it
//! reported closed. Whether a sensor is open is derived from those two
//! timestamps, so out-of-order delivery can never move a sensor backwards.

use super::registry::{SensorGroup, SensorId};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use strum::{EnumCount, IntoEnumIterator};

pub type Timestamp = DateTime<Utc>;

/// Last-open and last-closed timestamps of one sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorState {
    pub last_open: Option<Timestamp>,
    pub last_closed: Option<Timestamp>,
}

impl SensorState {
    /// Strictly `last_open > last_closed`; a missing timestamp counts as the epoch.
    pub fn is_open(&self) -> bool {
        match (self.last_open, self.last_closed) {
            (Some(open), Some(closed)) => open > closed,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// True if the sensor reported closed less than `window` before `now`.
    pub fn closed_within(&self, now: Timestamp, window: TimeDelta) -> bool {
        self.last_closed
            .is_some_and(|closed| now.signed_duration_since(closed) < window)
    }

    /// Move `last_open` forward to `now`. Returns whether it changed.
    pub fn record_open(&mut self, now: Timestamp) -> bool {
        advance(&mut self.last_open, now)
    }

    /// Move `last_closed` forward to `now`. Returns whether it changed.
    pub fn record_closed(&mut self, now: Timestamp) -> bool {
        advance(&mut self.last_closed, now)
    }
}

fn advance(field: &mut Option<Timestamp>, now: Timestamp) -> bool {
    match *field {
        Some(previous) if previous >= now => false,
        _ => {
            *field = Some(now);
            true
        }
    }
}

/// State of every registered sensor, indexed by [`SensorId`].
///
/// `Copy` so decisions can run on a snapshot taken under the lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStateTable {
    states: [SensorState; SensorId::COUNT],
}

impl SensorStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SensorId) -> &SensorState {
        &self.states[id.index()]
    }

    pub fn get_mut(&mut self, id: SensorId) -> &mut SensorState {
        &mut self.states[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorId, &SensorState)> {
        SensorId::iter().zip(self.states.iter())
    }

    pub fn any_open(&self, group: SensorGroup) -> bool {
        self.iter()
            .any(|(id, state)| id.group() == group && state.is_open())
    }

    pub fn any_closed_within(&self, group: SensorGroup, now: Timestamp, window: TimeDelta) -> bool {
        self.iter()
            .any(|(id, state)| id.group() == group && state.closed_within(now, window))
    }
}

impl fmt::Display for SensorStateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn stamp(ts: Option<Timestamp>) -> String {
            ts.map(|t| t.format("%H:%M:%S%.3f").to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        for (i, (id, state)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}[open={} closed={}]",
                id,
                stamp(state.last_open),
                stamp(state.last_closed)
            )?;
        }
        Ok(())
    }
}
