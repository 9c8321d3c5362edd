//! Immediate and periodic ambient decisions.
//!
//! Both are pure functions of a state snapshot. Entry doors always outrank
//! gates. The immediate decision only speaks while something is open; the
//! periodic decision owns everything else (recently closed glow and idle).

use super::command::{AmbientCommand, Color};
use super::to_delta;
use super::GLOW_DELAY;
use crate::sensors::{SensorGroup, SensorStateTable, Timestamp};

/// Decision run right after an accepted sensor event.
///
/// Returns `None` when nothing is open.
pub fn decide_immediate(states: &SensorStateTable) -> Option<AmbientCommand> {
    if states.any_open(SensorGroup::Entry) {
        Some(AmbientCommand::Throb(Color::RED))
    } else if states.any_open(SensorGroup::Gate) {
        Some(AmbientCommand::Throb(Color::YELLOW))
    } else {
        None
    }
}

/// Decision run on every tick.
///
/// Returns `None` while any sensor is open, since the immediate decision
/// already published for that case.
pub fn decide_periodic(states: &SensorStateTable, now: Timestamp) -> Option<AmbientCommand> {
    if states.any_open(SensorGroup::Entry) || states.any_open(SensorGroup::Gate) {
        return None;
    }

    let window = to_delta(GLOW_DELAY);
    let command = if states.any_closed_within(SensorGroup::Entry, now, window) {
        AmbientCommand::Glow(Color::RED)
    } else if states.any_closed_within(SensorGroup::Gate, now, window) {
        AmbientCommand::Glow(Color::YELLOW)
    } else {
        AmbientCommand::Idle(Color::TEAL)
    };
    Some(command)
}
