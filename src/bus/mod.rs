//! # Message Bus
//!
//! Minimal publish/queue-subscribe contract the dispatcher needs, with a NATS
//! implementation for production.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod nats;

pub use nats::NatsBus;

/// A message received from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to message bus at {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("failed to subscribe to '{subject}': {reason}")]
    Subscribe { subject: String, reason: String },
    #[error("failed to publish to '{subject}': {reason}")]
    Publish { subject: String, reason: String },
    #[error("failed to flush message bus: {0}")]
    Flush(String),
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Joins `queue_group` on `subject`; each message goes to one member of the group.
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<BoxStream<'static, BusMessage>, BusError>;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}
