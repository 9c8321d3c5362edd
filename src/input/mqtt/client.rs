//! MQTT client wrapper for sensor events and ambient commands.

use crate::ambient::CommandPublisher;
use crate::config::MqttConfig;
use crate::error::Result;
use crate::sensors::Timestamp;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: Timestamp,
}

/// Connection lifecycle and message events from the broker.
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// Broker accepted the connection (first connect or reconnect).
    Connected { at: Timestamp },
    Message(MqttMessage),
    /// Connection dropped; the event loop reconnects on its own.
    Disconnected { reason: String },
}

/// MQTT client for the ambient controller.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    reconnect_delay: Duration,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_session(true);

        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            reconnect_delay: config.reconnect_delay,
        }
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until the receiving side of the channel is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>) {
        info!("Starting MQTT event loop");

        loop {
            let event = match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        MqttEvent::Connected { at: Utc::now() }
                    } else {
                        warn!("MQTT connection refused: {:?}", ack.code);
                        continue;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let received_at = Utc::now();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Invalid UTF-8 in MQTT payload on {}: {}", publish.topic, e);
                            continue;
                        }
                    };

                    debug!("Received MQTT message on {}: {}", publish.topic, payload);

                    MqttEvent::Message(MqttMessage {
                        topic: publish.topic,
                        payload,
                        received_at,
                    })
                }
                Ok(_) => continue,
                Err(e) => {
                    log_connection_error(&e);
                    if tx
                        .send(MqttEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await
                        .is_err()
                    {
                        break;
                    }
                    // Wait before the next poll reconnects
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                error!("MQTT event channel closed");
                break;
            }
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

fn log_connection_error(e: &ConnectionError) {
    match e {
        ConnectionError::ConnectionRefused(code) => {
            error!("MQTT connection refused: {:?}", code);
        }
        other => {
            error!("MQTT connection error: {}", other);
        }
    }
}

#[async_trait]
impl CommandPublisher for AsyncClient {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<()> {
        self.publish(topic, QoS::AtMostOnce, true, payload).await?;
        Ok(())
    }
}

/// Subscribes to sensor topics after each (re)connect.
#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    async fn subscribe_topic(&self, topic: &str) -> Result<()>;
}

#[async_trait]
impl TopicSubscriber for AsyncClient {
    async fn subscribe_topic(&self, topic: &str) -> Result<()> {
        self.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}
