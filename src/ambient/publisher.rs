//! Outbound seam for ambient commands.

use crate::error::Result;
use async_trait::async_trait;

/// Publishes a retained message for the light controller.
///
/// Implemented for [`rumqttc::AsyncClient`]; tests plug in a recorder.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<()>;
}
