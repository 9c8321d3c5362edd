use crate::ambient::DEFAULT_AMBIENT_TOPIC;
use crate::error::{ControllerError, Result};
use crate::sensors::{SensorPolarity, SubscriptionScope};
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load environment variables from a dotenv file.
///
/// Variables already set in the environment win. Returns how many were
/// loaded; a missing file loads nothing.
pub fn load_dotenv(path: &Path) -> usize {
    let Ok(content) = fs::read_to_string(path) else {
        return 0;
    };

    let mut loaded = 0;
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the async runtime starts any threads
            unsafe { std::env::set_var(key, value) };
            loaded += 1;
        }
    }
    loaded
}

/// Split dotenv content into key/value pairs.
///
/// Values may contain spaces without quotes; matching surrounding quotes are
/// stripped.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
                .unwrap_or(value);
            Some((key.trim(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub sensors: SensorConfig,
    /// Topic the ambient command is published (retained) on.
    pub ambient_topic: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(serialize_with = "as_secs")]
    pub connect_timeout: Duration,
    #[serde(serialize_with = "as_secs")]
    pub reconnect_delay: Duration,
}

/// Per-deployment sensor wiring.
#[derive(Debug, Clone, Serialize)]
pub struct SensorConfig {
    pub topic_prefix: String,
    pub polarity: SensorPolarity,
    pub subscription: SubscriptionScope,
    /// Ignore the back gate entirely and treat it as closed.
    pub back_gate_always_closed: bool,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "ambient-controller".to_string(),
                username: None,
                password: None,
                connect_timeout: Duration::from_secs(10),
                reconnect_delay: Duration::from_secs(5),
            },
            sensors: SensorConfig {
                topic_prefix: "/fireblimp/out".to_string(),
                polarity: SensorPolarity::OpenHigh,
                subscription: SubscriptionScope::PerSensor,
                back_gate_always_closed: false,
            },
            ambient_topic: DEFAULT_AMBIENT_TOPIC.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `lookup`, falling back to defaults.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        // MQTT configuration
        if let Some(host) = lookup("MQTT_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = parsed(&lookup, "MQTT_PORT")? {
            config.mqtt.broker_port = port;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        config.mqtt.username = lookup("MQTT_USERNAME").filter(|u| !u.is_empty());
        config.mqtt.password = lookup("MQTT_PASSWORD");
        if let Some(secs) = parsed(&lookup, "MQTT_CONNECT_TIMEOUT_SECS")? {
            config.mqtt.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed(&lookup, "MQTT_RECONNECT_DELAY_SECS")? {
            config.mqtt.reconnect_delay = Duration::from_secs(secs);
        }

        // Sensor wiring
        if let Some(prefix) = lookup("SENSOR_TOPIC_PREFIX") {
            config.sensors.topic_prefix = prefix;
        }
        if let Some(polarity) = parsed(&lookup, "SENSOR_POLARITY")? {
            config.sensors.polarity = polarity;
        }
        if let Some(scope) = parsed(&lookup, "SENSOR_SUBSCRIPTION")? {
            config.sensors.subscription = scope;
        }
        if let Some(forced) = parsed(&lookup, "BACK_GATE_ALWAYS_CLOSED")? {
            config.sensors.back_gate_always_closed = forced;
        }

        if let Some(topic) = lookup("AMBIENT_TOPIC") {
            config.ambient_topic = topic;
        }

        Ok(config)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ControllerError::InvalidConfig { key, value })
        })
        .transpose()
}
