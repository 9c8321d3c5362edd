//! Classification of incoming sensor messages.
//!
//! Resolves a `(topic, payload)` pair to a sensor reading and applies it to
//! the state table, dropping stale retained "closed" replays that arrive
//! right after a (re)connect.

use super::IGNORE_RETAINED_CLOSE_DURATION;
use super::to_delta;
use crate::sensors::{Reading, SensorId, SensorRegistry, SensorStateTable, Timestamp};

/// What happened to an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Topic does not belong to any sensor.
    UnknownTopic,
    /// Payload is neither the open nor the closed value.
    UnknownPayload(SensorId),
    /// Sensor is configured as permanently closed.
    ForcedClosed(SensorId),
    /// Closed payload inside the retained-replay window after connecting.
    SuppressedRetainedClose(SensorId),
    /// Reading is valid but older than what is already recorded.
    Stale(SensorId, Reading),
    /// A timestamp moved forward.
    Updated(SensorId, Reading),
}

impl EventOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self, EventOutcome::Updated(..))
    }
}

/// Apply one message to `states`.
///
/// `epoch` is the time of the most recent successful connection, if any.
pub fn apply_event(
    states: &mut SensorStateTable,
    registry: &SensorRegistry,
    epoch: Option<Timestamp>,
    now: Timestamp,
    topic: &str,
    payload: &str,
) -> EventOutcome {
    let Some(sensor) = registry.resolve(topic) else {
        return EventOutcome::UnknownTopic;
    };
    let id = sensor.id;

    if sensor.forced_closed {
        return EventOutcome::ForcedClosed(id);
    }

    let Some(reading) = sensor.reading(payload) else {
        return EventOutcome::UnknownPayload(id);
    };

    // Retained open replays are kept so a door left open across a reconnect
    // still shows as open.
    if reading == Reading::Closed
        && epoch.is_some_and(|connected| {
            now.signed_duration_since(connected) < to_delta(IGNORE_RETAINED_CLOSE_DURATION)
        })
    {
        return EventOutcome::SuppressedRetainedClose(id);
    }

    let state = states.get_mut(id);
    let changed = match reading {
        Reading::Open => state.record_open(now),
        Reading::Closed => state.record_closed(now),
    };

    if changed {
        EventOutcome::Updated(id, reading)
    } else {
        EventOutcome::Stale(id, reading)
    }
}
