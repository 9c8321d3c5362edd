use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ControllerError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("Timed out after {timeout:?} connecting to MQTT broker {host}:{port}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("MQTT event loop stopped before the broker accepted the connection")]
    EventLoopClosed,

    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
