//! Ambient lighting controller library.
//!
//! Tracks door and gate contact sensors published over MQTT and derives the
//! ambient light command (throb, glow or idle) for the downstream light
//! controller.

pub mod ambient;
pub mod config;
pub mod error;
pub mod input;
pub mod sensors;
