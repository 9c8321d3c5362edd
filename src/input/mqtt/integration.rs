//! MQTT integration orchestrator for the ambient controller.
//!
//! Wires the MQTT client, the ambient controller and the periodic ticker
//! together, keeping MQTT internals out of main.rs.

use super::client::{MqttClient, MqttEvent, TopicSubscriber};
use crate::ambient::{AmbientController, CommandPublisher, TICK_INTERVAL};
use crate::config::Config;
use crate::error::{ControllerError, Result};
use crate::sensors::{SensorRegistry, Timestamp};
use chrono::Utc;
use log::{error, info, warn};
use rumqttc::AsyncClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// MQTT integration orchestrator.
pub struct AmbientIntegration {
    config: Config,
}

impl AmbientIntegration {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to the broker and start processing.
    ///
    /// Waits for the first successful connection; failing to connect within
    /// the configured timeout is an error. Once connected, the event consumer
    /// and the periodic ticker run as background tasks.
    pub async fn start(self) -> Result<RunningIntegration> {
        let mqtt = &self.config.mqtt;
        let sensors = &self.config.sensors;

        info!("[MQTT] Connecting to {}:{}", mqtt.broker_host, mqtt.broker_port);

        let mqtt_client = MqttClient::new(mqtt);
        let client = mqtt_client.client();

        let registry = SensorRegistry::new(
            &sensors.topic_prefix,
            sensors.polarity,
            sensors.back_gate_always_closed,
        );
        if sensors.back_gate_always_closed {
            warn!("[MQTT] Back gate is configured as always closed; its events are ignored");
        }
        let topics = registry.subscriptions(sensors.subscription);
        let controller = Arc::new(AmbientController::new(
            registry,
            self.config.ambient_topic.clone(),
            client.clone(),
        ));

        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);

        // Start MQTT event loop FIRST (so it can establish connection)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(event_tx).await;
        });

        let connected = tokio::time::timeout(mqtt.connect_timeout, async {
            while let Some(event) = event_rx.recv().await {
                match event {
                    MqttEvent::Connected { at } => return Some(at),
                    MqttEvent::Disconnected { reason } => {
                        warn!("[MQTT] Not connected yet: {}", reason);
                    }
                    MqttEvent::Message(_) => {}
                }
            }
            None
        })
        .await;

        let connected_at = match connected {
            Ok(Some(at)) => at,
            Ok(None) => {
                mqtt_loop.abort();
                return Err(ControllerError::EventLoopClosed);
            }
            Err(_) => {
                mqtt_loop.abort();
                return Err(ControllerError::ConnectTimeout {
                    host: mqtt.broker_host.clone(),
                    port: mqtt.broker_port,
                    timeout: mqtt.connect_timeout,
                });
            }
        };

        info!("[MQTT] Connection established, subscribing to sensor topics");
        on_connected(&controller, &client, &topics, connected_at).await;

        let consumer = tokio::spawn(consume_events(
            controller.clone(),
            client.clone(),
            topics,
            event_rx,
        ));

        let ticker = run_periodic(controller.clone(), TICK_INTERVAL);

        info!(
            "[MQTT] Ambient integration started, publishing to {}",
            self.config.ambient_topic
        );

        Ok(RunningIntegration {
            client,
            mqtt_loop,
            workers: vec![consumer, ticker],
        })
    }
}

/// Feed broker events into the controller until the event stream ends.
///
/// Every `Connected` resets the connection epoch and resubscribes, since the
/// session is clean and the broker forgets subscriptions on reconnect.
pub async fn consume_events<P, S>(
    controller: Arc<AmbientController<P>>,
    subscriber: S,
    topics: Vec<String>,
    mut event_rx: mpsc::Receiver<MqttEvent>,
) where
    P: CommandPublisher,
    S: TopicSubscriber,
{
    while let Some(event) = event_rx.recv().await {
        match event {
            MqttEvent::Connected { at } => {
                info!("[MQTT] Reconnected, resubscribing");
                on_connected(&controller, &subscriber, &topics, at).await;
            }
            MqttEvent::Message(msg) => {
                if let Err(e) = controller
                    .on_sensor_message(&msg.topic, &msg.payload, msg.received_at)
                    .await
                {
                    warn!("[MQTT] Failed to publish ambient command: {}", e);
                }
            }
            MqttEvent::Disconnected { reason } => {
                warn!("[MQTT] Connection lost: {}", reason);
            }
        }
    }
    error!("[MQTT] Event stream ended");
}

async fn on_connected<P, S>(
    controller: &AmbientController<P>,
    subscriber: &S,
    topics: &[String],
    at: Timestamp,
) where
    P: CommandPublisher,
    S: TopicSubscriber,
{
    // Reset before subscribing so retained replays fall inside the window.
    controller.on_connected(at);
    for topic in topics {
        info!("[MQTT] Subscribing to {}", topic);
        if let Err(e) = subscriber.subscribe_topic(topic).await {
            warn!("[MQTT] Failed to subscribe to {}: {}", topic, e);
        }
    }
}

/// Spawn the task that runs the periodic decision once per `period`.
pub fn run_periodic<P>(controller: Arc<AmbientController<P>>, period: Duration) -> JoinHandle<()>
where
    P: CommandPublisher + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = controller.on_tick(Utc::now()).await {
                warn!("[Ambient] Periodic publish failed: {}", e);
            }
        }
    })
}

/// Handle to a started integration.
pub struct RunningIntegration {
    client: AsyncClient,
    mqtt_loop: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl RunningIntegration {
    /// Stop processing and disconnect.
    ///
    /// Nothing is published on the way out; the last retained command stays
    /// with the broker for the light controller.
    pub async fn shutdown(self) {
        for worker in &self.workers {
            worker.abort();
        }

        if let Err(e) = self.client.disconnect().await {
            warn!("[MQTT] Failed to request disconnect: {:?}", e);
        }
        // Give the event loop a moment to flush the disconnect
        let mqtt_loop = self.mqtt_loop.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.mqtt_loop)
            .await
            .is_err()
        {
            warn!("[MQTT] Event loop did not stop within {:?}", SHUTDOWN_GRACE);
            mqtt_loop.abort();
        }
        info!("[MQTT] Integration stopped");
    }
}
