//! Monitor binary for sensor events and ambient commands.
//!
//! Usage:
//!   cargo run --bin ambient-monitor
//!
//! This connects to the MQTT broker with the same configuration as the
//! controller, subscribes to the sensor topics and the ambient topic, and
//! logs decoded sensor readings and ambient commands. It never publishes.

use ambient_controller::ambient::AmbientCommand;
use ambient_controller::config::{Config, load_dotenv};
use ambient_controller::input::mqtt::{MqttClient, MqttEvent, MqttMessage};
use ambient_controller::sensors::{SensorRegistry, SubscriptionScope};
use log::{error, info, warn};
use rumqttc::QoS;
use std::path::Path;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    load_dotenv(Path::new(".env"));

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting ambient monitor");

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    // Never steal the controller's session
    config.mqtt.client_id = format!("{}-monitor", config.mqtt.client_id);

    info!(
        "Connecting to MQTT broker at {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );

    let registry = SensorRegistry::new(
        &config.sensors.topic_prefix,
        config.sensors.polarity,
        config.sensors.back_gate_always_closed,
    );
    let mut topics = registry.subscriptions(SubscriptionScope::Wildcard);
    topics.push(config.ambient_topic.clone());

    let mqtt_client = MqttClient::new(&config.mqtt);
    let async_client = mqtt_client.client();

    let (event_tx, mut event_rx) = mpsc::channel(100);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(event_tx).await;
    });

    let ambient_topic = config.ambient_topic.clone();
    let monitor_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                MqttEvent::Connected { .. } => {
                    for topic in &topics {
                        if let Err(e) = async_client.subscribe(topic, QoS::AtMostOnce).await {
                            warn!("Failed to subscribe to {}: {}", topic, e);
                        }
                    }
                    info!("Subscribed to {:?}", topics);
                }
                MqttEvent::Message(msg) if msg.topic == ambient_topic => log_command(&msg),
                MqttEvent::Message(msg) => log_sensor(&registry, &msg),
                MqttEvent::Disconnected { reason } => warn!("Connection lost: {}", reason),
            }
        }
    });

    info!("Listening... Press Ctrl+C to exit.");

    tokio::select! {
        _ = mqtt_handle => {
            warn!("MQTT event loop ended");
        }
        _ = monitor_handle => {
            warn!("Monitor ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }
}

fn log_command(msg: &MqttMessage) {
    match msg.payload.parse::<AmbientCommand>() {
        Ok(command) => info!(">>> Ambient: {:?}", command),
        Err(e) => warn!(">>> Ambient: {}", e),
    }
}

fn log_sensor(registry: &SensorRegistry, msg: &MqttMessage) {
    let Some(sensor) = registry.resolve(&msg.topic) else {
        info!("    {} = {:?} (not a sensor)", msg.topic, msg.payload);
        return;
    };
    match sensor.reading(&msg.payload) {
        Some(reading) => info!(
            "    {} {}{}",
            sensor.id,
            reading,
            if sensor.forced_closed { " (forced closed)" } else { "" }
        ),
        None => info!("    {} sent unknown payload {:?}", sensor.id, msg.payload),
    }
}
