//! NATS transport for agents.
//!
//! Each channel in an agent's dispatch table becomes one NATS subject with
//! the same name. All subscriptions are merged into a single stream so the
//! reactor handles one message at a time.

use async_nats::Subscriber;
use depot_core::Envelope;
use futures::stream::SelectAll;
use tracing::{debug, info};

use crate::error::NodeError;

/// NATS client wrapper for a node.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, NodeError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| NodeError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Subscribe to every channel and merge the subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Nats`] if any subscription fails.
    pub async fn subscribe_all<'a>(
        &self,
        channels: impl IntoIterator<Item = &'a str>,
    ) -> Result<SelectAll<Subscriber>, NodeError> {
        let mut subscribers = Vec::new();
        for channel in channels {
            let subscriber = self
                .client
                .subscribe(channel.to_owned())
                .await
                .map_err(|e| NodeError::Nats(format!("failed to subscribe to {channel}: {e}")))?;
            info!(subject = channel, "subscribed");
            subscribers.push(subscriber);
        }
        Ok(futures::stream::select_all(subscribers))
    }

    /// Encode and publish one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Nats`] if encoding or publishing fails.
    pub async fn publish(&self, envelope: &Envelope) -> Result<(), NodeError> {
        let payload = envelope
            .message
            .encode()
            .map_err(|e| NodeError::Nats(format!("failed to encode message: {e}")))?;
        debug!(
            subject = envelope.channel,
            kind = envelope.message.kind(),
            bytes = payload.len(),
            "publishing"
        );
        self.client
            .publish(envelope.channel.clone(), payload.into())
            .await
            .map_err(|e| {
                NodeError::Nats(format!("failed to publish to {}: {e}", envelope.channel))
            })
    }

    /// Flush buffered publications.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Nats`] if the flush fails.
    pub async fn flush(&self) -> Result<(), NodeError> {
        self.client
            .flush()
            .await
            .map_err(|e| NodeError::Nats(format!("failed to flush: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use depot_core::Outgoing;
    use depot_types::Tick;
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    #[ignore = "requires a NATS server on localhost:4222"]
    async fn tick_round_trips_as_raw_text() {
        let bus = NatsBus::connect("nats://localhost:4222").await.unwrap();
        let mut stream = bus.subscribe_all(["depot-test/tick"]).await.unwrap();
        bus.publish(&Envelope {
            channel: "depot-test/tick".to_owned(),
            message: Outgoing::Tick(Tick::new("2024-05-01T10:00:00Z")),
        })
        .await
        .unwrap();
        bus.flush().await.unwrap();

        let message = stream.next().await.unwrap();
        assert_eq!(message.subject.as_str(), "depot-test/tick");
        assert_eq!(message.payload.as_ref(), b"2024-05-01T10:00:00Z");
    }
}
