//! Static registry of the five door and gate contact sensors.
//!
//! The sensor set is fixed; only the topic prefix, the payload polarity and
//! the back-gate override vary between deployments.

use serde::Serialize;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// Which of the two semantic groups a sensor belongs to.
///
/// Entry sensors always take priority over gate sensors when both are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SensorGroup {
    Entry,
    Gate,
}

/// Identity of a physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum SensorId {
    FrontDoor,
    FrontGate,
    BackDoorWest,
    BackDoorEast,
    BackGate,
}

impl SensorId {
    pub fn group(self) -> SensorGroup {
        match self {
            SensorId::FrontDoor | SensorId::BackDoorWest | SensorId::BackDoorEast => {
                SensorGroup::Entry
            }
            SensorId::FrontGate | SensorId::BackGate => SensorGroup::Gate,
        }
    }

    /// Last topic segment the sensor board publishes on.
    pub fn topic_suffix(self) -> &'static str {
        match self {
            SensorId::FrontDoor => "16",
            SensorId::FrontGate => "15",
            SensorId::BackDoorWest => "22",
            SensorId::BackDoorEast => "18",
            SensorId::BackGate => "13",
        }
    }

    /// Position in a [`super::SensorStateTable`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Payload polarity of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SensorPolarity {
    /// `"1"` means open, `"0"` means closed.
    #[default]
    OpenHigh,
    /// `"0"` means open, `"1"` means closed.
    OpenLow,
}

impl SensorPolarity {
    /// Returns `(open_payload, closed_payload)`.
    pub fn payloads(self) -> (&'static str, &'static str) {
        match self {
            SensorPolarity::OpenHigh => ("1", "0"),
            SensorPolarity::OpenLow => ("0", "1"),
        }
    }
}

/// How the controller subscribes to sensor topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionScope {
    /// One subscription per sensor topic.
    #[default]
    PerSensor,
    /// A single `<prefix>/#` subscription.
    Wildcard,
}

/// A physical contact sensor and the payloads it publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: SensorId,
    pub topic: String,
    pub open_payload: &'static str,
    pub closed_payload: &'static str,
    /// Sensor wiring is unreliable; treat it as permanently closed.
    pub forced_closed: bool,
}

/// Reading decoded from a sensor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Reading {
    Open,
    Closed,
}

impl Sensor {
    /// Exact match against the open and closed payloads.
    pub fn reading(&self, payload: &str) -> Option<Reading> {
        if payload == self.open_payload {
            Some(Reading::Open)
        } else if payload == self.closed_payload {
            Some(Reading::Closed)
        } else {
            None
        }
    }
}

/// The fixed set of sensors for one deployment.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    prefix: String,
    sensors: Vec<Sensor>,
}

impl SensorRegistry {
    pub fn new(prefix: &str, polarity: SensorPolarity, back_gate_always_closed: bool) -> Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        let (open_payload, closed_payload) = polarity.payloads();
        let sensors = SensorId::iter()
            .map(|id| Sensor {
                id,
                topic: format!("{}/{}", prefix, id.topic_suffix()),
                open_payload,
                closed_payload,
                forced_closed: back_gate_always_closed && id == SensorId::BackGate,
            })
            .collect();

        Self { prefix, sensors }
    }

    /// Find the sensor publishing on `topic`, if any.
    pub fn resolve(&self, topic: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|sensor| sensor.topic == topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    /// Topic filters to subscribe to for the given scope.
    pub fn subscriptions(&self, scope: SubscriptionScope) -> Vec<String> {
        match scope {
            SubscriptionScope::PerSensor => {
                self.sensors.iter().map(|sensor| sensor.topic.clone()).collect()
            }
            SubscriptionScope::Wildcard => vec![format!("{}/#", self.prefix)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_five_sensors_in_two_groups() {
        let registry = SensorRegistry::new("/fireblimp/out", SensorPolarity::OpenHigh, false);
        assert_eq!(registry.iter().count(), SensorId::COUNT);

        let entries: Vec<_> = registry
            .iter()
            .filter(|s| s.id.group() == SensorGroup::Entry)
            .map(|s| s.id)
            .collect();
        assert_eq!(
            entries,
            vec![
                SensorId::FrontDoor,
                SensorId::BackDoorWest,
                SensorId::BackDoorEast
            ]
        );
    }

    #[test]
    fn test_resolve_topic() {
        let registry = SensorRegistry::new("/fireblimp/out/", SensorPolarity::OpenHigh, false);
        let sensor = registry.resolve("/fireblimp/out/22").unwrap();
        assert_eq!(sensor.id, SensorId::BackDoorWest);
        assert!(registry.resolve("/fireblimp/out/99").is_none());
        assert!(registry.resolve("ambient/input").is_none());
    }

    #[test]
    fn test_polarity_inverts_payloads() {
        let high = SensorRegistry::new("p", SensorPolarity::OpenHigh, false);
        let low = SensorRegistry::new("p", SensorPolarity::OpenLow, false);

        let door = high.resolve("p/16").unwrap();
        assert_eq!(door.reading("1"), Some(Reading::Open));
        assert_eq!(door.reading("0"), Some(Reading::Closed));

        let door = low.resolve("p/16").unwrap();
        assert_eq!(door.reading("1"), Some(Reading::Closed));
        assert_eq!(door.reading("0"), Some(Reading::Open));
        assert_eq!(door.reading("battery:low"), None);
    }

    #[test]
    fn test_reading_requires_exact_payload() {
        let registry = SensorRegistry::new("p", SensorPolarity::OpenHigh, false);
        let door = registry.resolve("p/16").unwrap();
        assert_eq!(door.reading(" 1"), None);
        assert_eq!(door.reading("0\n"), None);
        assert_eq!(door.reading("10"), None);
    }

    #[test]
    fn test_subscription_scopes() {
        let registry = SensorRegistry::new("/fireblimp/out", SensorPolarity::OpenHigh, false);
        assert_eq!(
            registry.subscriptions(SubscriptionScope::Wildcard),
            vec!["/fireblimp/out/#".to_string()]
        );
        let topics = registry.subscriptions(SubscriptionScope::PerSensor);
        assert_eq!(topics.len(), 5);
        assert!(topics.contains(&"/fireblimp/out/13".to_string()));
    }

    #[test]
    fn test_back_gate_override_only_affects_back_gate() {
        let registry = SensorRegistry::new("p", SensorPolarity::OpenHigh, true);
        for sensor in registry.iter() {
            assert_eq!(sensor.forced_closed, sensor.id == SensorId::BackGate);
        }
    }

    #[test]
    fn test_polarity_parses_from_kebab_case() {
        assert_eq!(
            "open-low".parse::<SensorPolarity>().unwrap(),
            SensorPolarity::OpenLow
        );
        assert_eq!(
            "wildcard".parse::<SubscriptionScope>().unwrap(),
            SubscriptionScope::Wildcard
        );
        assert!("sideways".parse::<SensorPolarity>().is_err());
    }
}
