//! MQTT input source for door and gate contact sensors.
//!
//! This module provides the MQTT client that receives sensor events and
//! publishes ambient commands, plus the integration that drives the
//! ambient controller from it.

mod client;
mod integration;

pub use client::{MqttClient, MqttEvent, MqttMessage, TopicSubscriber};
pub use integration::{AmbientIntegration, RunningIntegration, consume_events, run_periodic};
