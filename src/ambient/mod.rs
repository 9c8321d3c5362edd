//! Ambient lighting logic.
//!
//! Turns sensor messages into state updates and state into ambient light
//! commands for the downstream light controller.

pub mod classifier;
pub mod command;
pub mod controller;
pub mod decision;
pub mod publisher;

pub use classifier::{EventOutcome, apply_event};
pub use command::{AmbientCommand, AmbientMode, Color};
pub use controller::AmbientController;
pub use decision::{decide_immediate, decide_periodic};
pub use publisher::CommandPublisher;

use chrono::TimeDelta;
use std::time::Duration;

/// Closed payloads this soon after connecting are treated as retained replays.
pub const IGNORE_RETAINED_CLOSE_DURATION: Duration = Duration::from_secs(5);

/// How long a closed sensor keeps glowing.
pub const GLOW_DELAY: Duration = Duration::from_secs(120);

/// Period of the periodic decision.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_AMBIENT_TOPIC: &str = "ambient/input";

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::milliseconds(duration.as_millis() as i64)
}
