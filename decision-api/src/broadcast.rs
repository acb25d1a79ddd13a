//! Forwarding of deleted decisions to an upstream consumer.
//!
//! Deletions are pushed onto a bounded queue. A full queue blocks the
//! deleting request for at most the configured send timeout, so a stalled
//! consumer slows deletions down but never hangs them.

use crate::config::RelayConfig;
use crate::error::RelayError;
use decision_types::Decision;
use std::time::Duration;
use tokio::sync::mpsc;

/// One batch of deleted decisions, in deletion order.
pub type DeletionBatch = Vec<Decision>;

/// Producer side of the deletion queue.
#[derive(Debug, Clone)]
pub enum DeletionRelay {
    /// No upstream consumer; forwarding is a no-op.
    Disabled,
    /// Forward to a bounded queue.
    Enabled {
        /// Queue producer.
        sender: mpsc::Sender<DeletionBatch>,
        /// Longest a request may wait for queue space.
        send_timeout: Duration,
    },
}

impl DeletionRelay {
    /// Create an enabled relay and the receiver its consumer reads from.
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<DeletionBatch>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self::Enabled {
                sender,
                send_timeout,
            },
            receiver,
        )
    }

    /// Build from configuration.
    ///
    /// Returns the receiver only when the relay is enabled.
    pub fn from_config(config: &RelayConfig) -> (Self, Option<mpsc::Receiver<DeletionBatch>>) {
        if !config.enabled {
            return (Self::Disabled, None);
        }
        let (relay, receiver) =
            Self::channel(config.capacity, Duration::from_millis(config.send_timeout_ms));
        (relay, Some(receiver))
    }

    /// Whether deletions are forwarded at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    /// Queue a batch of deleted decisions.
    pub async fn forward(&self, batch: DeletionBatch) -> Result<(), RelayError> {
        let Self::Enabled {
            sender,
            send_timeout,
        } = self
        else {
            return Ok(());
        };

        match tokio::time::timeout(*send_timeout, sender.send(batch)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::Closed),
            Err(_) => Err(RelayError::Timeout {
                timeout_ms: u64::try_from(send_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Spawn the consumer that drains the deletion queue.
///
/// The bundled consumer only logs; an upstream client plugs in here.
pub fn spawn_relay_consumer(
    mut receiver: mpsc::Receiver<DeletionBatch>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Deletion relay consumer started");
        while let Some(batch) = receiver.recv().await {
            for decision in &batch {
                tracing::info!(
                    id = decision.id.value(),
                    value = decision.value.as_deref().unwrap_or_default(),
                    scope = decision.scope.as_deref().unwrap_or_default(),
                    "relaying deleted decision"
                );
            }
            tracing::debug!("relayed {} deleted decisions", batch.len());
        }
        tracing::info!("Deletion relay consumer stopped");
    })
}
