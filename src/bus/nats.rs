//! NATS-backed [`MessageBus`].

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use tracing::info;

use super::{BusError, BusMessage, MessageBus};

/// Shared NATS connection; cheap to clone.
#[derive(Debug, Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|err| BusError::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        info!(url, "connected to message bus");
        Ok(Self { client })
    }

    /// Pushes buffered publishes to the server before shutdown.
    pub async fn flush(&self) -> Result<(), BusError> {
        self.client
            .flush()
            .await
            .map_err(|err| BusError::Flush(err.to_string()))
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<BoxStream<'static, BusMessage>, BusError> {
        let subscriber = self
            .client
            .queue_subscribe(subject.to_string(), queue_group.to_string())
            .await
            .map_err(|err| BusError::Subscribe {
                subject: subject.to_string(),
                reason: err.to_string(),
            })?;

        Ok(subscriber
            .map(|message| BusMessage {
                subject: message.subject.to_string(),
                payload: message.payload.to_vec(),
            })
            .boxed())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|err| BusError::Publish {
                subject: subject.to_string(),
                reason: err.to_string(),
            })
    }
}
