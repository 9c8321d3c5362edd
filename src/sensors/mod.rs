//! Door and gate contact sensors.
//!
//! This module provides the static sensor registry and the shared
//! timestamp table updated from MQTT events and read by the ambient
//! decision procedures.

pub mod registry;
pub mod state;

pub use registry::{
    Reading, Sensor, SensorGroup, SensorId, SensorPolarity, SensorRegistry, SubscriptionScope,
};
pub use state::{SensorState, SensorStateTable, Timestamp};
