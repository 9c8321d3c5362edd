//! Ambient controller: owns sensor state and publishes decisions.
//!
//! The MQTT consumer task feeds [`AmbientController::on_sensor_message`] and
//! the ticker task calls [`AmbientController::on_tick`]. Both share one
//! controller behind an `Arc`; the state table and connection epoch sit
//! behind a single lock so a decision never sees a half-applied update.
//! A second, async lock serializes update → decide → publish, so the last
//! retained command always matches the state at the time it went out.

use super::classifier::{EventOutcome, apply_event};
use super::command::AmbientCommand;
use super::decision::{decide_immediate, decide_periodic};
use super::publisher::CommandPublisher;
use crate::error::Result;
use crate::sensors::{SensorRegistry, SensorStateTable, Timestamp};
use log::{debug, info};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Tracker {
    states: SensorStateTable,
    /// Time of the most recent successful broker connection.
    epoch: Option<Timestamp>,
}

pub struct AmbientController<P> {
    registry: SensorRegistry,
    topic: String,
    tracker: Mutex<Tracker>,
    /// Held from snapshot until the publish completes.
    publish_lock: tokio::sync::Mutex<()>,
    publisher: P,
}

impl<P: CommandPublisher> AmbientController<P> {
    pub fn new(registry: SensorRegistry, topic: impl Into<String>, publisher: P) -> Self {
        Self {
            registry,
            topic: topic.into(),
            tracker: Mutex::new(Tracker::default()),
            publish_lock: tokio::sync::Mutex::new(()),
            publisher,
        }
    }

    /// Reset the connection epoch, re-arming retained close suppression.
    pub fn on_connected(&self, now: Timestamp) {
        self.tracker.lock().epoch = Some(now);
        info!("[Ambient] Connection epoch reset at {}", now.format("%H:%M:%S%.3f"));
    }

    /// Classify one message and update state. Returns whether state changed.
    pub fn handle_event(&self, topic: &str, payload: &str, now: Timestamp) -> bool {
        let mut tracker = self.tracker.lock();
        let epoch = tracker.epoch;
        let outcome = apply_event(
            &mut tracker.states,
            &self.registry,
            epoch,
            now,
            topic,
            payload,
        );

        match outcome {
            EventOutcome::UnknownTopic => return false,
            EventOutcome::Updated(id, reading) => {
                info!("[Ambient] {} {}", id, reading);
            }
            EventOutcome::SuppressedRetainedClose(id) => {
                debug!("[Ambient] Ignoring retained close for {}", id);
            }
            other => {
                debug!("[Ambient] Ignored {} = {:?}: {:?}", topic, payload, other);
            }
        }
        debug!("[Ambient] State: {}", tracker.states);

        outcome.is_update()
    }

    /// Handle a sensor message and publish the immediate decision, if any.
    pub async fn on_sensor_message(
        &self,
        topic: &str,
        payload: &str,
        now: Timestamp,
    ) -> Result<Option<AmbientCommand>> {
        let _sequenced = self.publish_lock.lock().await;
        if !self.handle_event(topic, payload, now) {
            return Ok(None);
        }

        let command = decide_immediate(&self.snapshot());
        if let Some(command) = command {
            self.publish(command).await?;
        }
        Ok(command)
    }

    /// Run the periodic decision and publish its command, if any.
    pub async fn on_tick(&self, now: Timestamp) -> Result<Option<AmbientCommand>> {
        let _sequenced = self.publish_lock.lock().await;
        let command = decide_periodic(&self.snapshot(), now);
        if let Some(command) = command {
            self.publish(command).await?;
        }
        Ok(command)
    }

    /// Copy of the current state table.
    pub fn snapshot(&self) -> SensorStateTable {
        self.tracker.lock().states
    }

    async fn publish(&self, command: AmbientCommand) -> Result<()> {
        debug!("[Ambient] Publishing {} to {}", command, self.topic);
        self.publisher
            .publish_retained(&self.topic, command.payload())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient::{Color, DEFAULT_AMBIENT_TOPIC};
    use crate::sensors::{SensorId, SensorPolarity};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};
    use tokio_test::assert_ok;

    const FRONT_DOOR: &str = "/fireblimp/out/16";
    const FRONT_GATE: &str = "/fireblimp/out/15";

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CommandPublisher for Arc<RecordingPublisher> {
        async fn publish_retained(&self, topic: &str, payload: String) -> Result<()> {
            self.published.lock().push((topic.to_string(), payload));
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<String> {
            self.published
                .lock()
                .drain(..)
                .map(|(_, payload)| payload)
                .collect()
        }
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn controller() -> (AmbientController<Arc<RecordingPublisher>>, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let registry = SensorRegistry::new("/fireblimp/out", SensorPolarity::OpenHigh, false);
        let controller = AmbientController::new(registry, DEFAULT_AMBIENT_TOPIC, publisher.clone());
        (controller, publisher)
    }

    #[tokio::test]
    async fn test_door_cycle_scenario() {
        let (controller, publisher) = controller();
        controller.on_connected(at(-60));

        let command = assert_ok!(controller.on_sensor_message(FRONT_DOOR, "1", at(0)).await);
        assert_eq!(command, Some(AmbientCommand::Throb(Color::RED)));
        assert_eq!(publisher.take(), vec!["throb:255:0:0:"]);

        assert_eq!(assert_ok!(controller.on_tick(at(10)).await), None);
        assert!(publisher.take().is_empty());

        let command = assert_ok!(controller.on_sensor_message(FRONT_DOOR, "0", at(10)).await);
        assert_eq!(command, None);
        assert!(publisher.take().is_empty());

        assert_ok!(controller.on_tick(at(11)).await);
        assert_eq!(publisher.take(), vec!["glow:255:0:0:"]);

        assert_ok!(controller.on_tick(at(131)).await);
        assert_eq!(publisher.take(), vec!["glow:0:128:128:"]);
    }

    #[tokio::test]
    async fn test_publishes_retained_to_ambient_topic() {
        let (controller, publisher) = controller();
        assert_ok!(controller.on_sensor_message(FRONT_GATE, "1", at(0)).await);

        let published = publisher.published.lock().clone();
        assert_eq!(
            published,
            vec![(DEFAULT_AMBIENT_TOPIC.to_string(), "throb:255:255:0:".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ignored_messages_publish_nothing() {
        let (controller, publisher) = controller();
        controller.on_connected(at(0));

        assert_ok!(controller.on_sensor_message("zigbee2mqtt/bridge/state", "online", at(1)).await);
        assert_ok!(controller.on_sensor_message(FRONT_DOOR, "0", at(2)).await);
        assert_ok!(controller.on_sensor_message(FRONT_DOOR, "x", at(8)).await);

        assert!(publisher.take().is_empty());
        assert_eq!(controller.snapshot(), SensorStateTable::new());
    }

    /// Holds the first publish until released.
    struct GatedPublisher {
        published: Mutex<Vec<String>>,
        first_held: AtomicBool,
        entered: Notify,
        release: Semaphore,
    }

    impl GatedPublisher {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                first_held: AtomicBool::new(false),
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl CommandPublisher for Arc<GatedPublisher> {
        async fn publish_retained(&self, _topic: &str, payload: String) -> Result<()> {
            if !self.first_held.swap(true, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.acquire().await.unwrap().forget();
            }
            self.published.lock().push(payload);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_in_flight_cannot_overwrite_throb() {
        let publisher = Arc::new(GatedPublisher::new());
        let registry = SensorRegistry::new("/fireblimp/out", SensorPolarity::OpenHigh, false);
        let controller = Arc::new(AmbientController::new(
            registry,
            DEFAULT_AMBIENT_TOPIC,
            publisher.clone(),
        ));

        let tick = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.on_tick(at(0)).await })
        };
        publisher.entered.notified().await;

        let door = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.on_sensor_message(FRONT_DOOR, "1", at(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher.release.add_permits(1);

        assert_ok!(tick.await.unwrap());
        assert_ok!(door.await.unwrap());

        let published = publisher.published.lock().clone();
        assert_eq!(published, vec!["glow:0:128:128:", "throb:255:0:0:"]);
        assert!(controller.snapshot().get(SensorId::FrontDoor).is_open());
    }

    #[test]
    fn test_handle_event_reports_updates() {
        let (controller, _publisher) = controller();
        assert!(controller.handle_event(FRONT_DOOR, "1", at(0)));
        assert!(!controller.handle_event(FRONT_DOOR, "1", at(0)));
        assert!(controller.snapshot().get(SensorId::FrontDoor).is_open());
    }
}
