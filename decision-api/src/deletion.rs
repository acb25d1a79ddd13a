//! Soft deletion of decisions with upstream forwarding.

use crate::broadcast::DeletionRelay;
use crate::error::Result;
use crate::format::format_decisions;
use crate::server::ApiMetrics;
use crate::storage::{DecisionFilter, DecisionStore, StoredDecision};
use chrono::{DateTime, Utc};
use decision_types::{DecisionId, DeleteDecisionResponse, DeleteDecisionsResponse};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Serves the deletion endpoints.
#[derive(Clone)]
pub struct Deletions {
    store: Arc<dyn DecisionStore>,
    relay: DeletionRelay,
    metrics: Arc<ApiMetrics>,
}

impl std::fmt::Debug for Deletions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deletions")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

impl Deletions {
    /// Create a deletion service.
    pub fn new(store: Arc<dyn DecisionStore>, relay: DeletionRelay, metrics: Arc<ApiMetrics>) -> Self {
        Self {
            store,
            relay,
            metrics,
        }
    }

    /// Soft-delete one decision by its textual id.
    ///
    /// The id is validated before the store is touched.
    pub async fn delete_by_id(
        &self,
        raw_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DeleteDecisionResponse> {
        let id: DecisionId = raw_id.parse()?;
        let (count, removed) = self.store.soft_delete_by_id(id, now).await?;
        self.metrics
            .decisions_deleted_total
            .fetch_add(count, Ordering::Relaxed);

        self.forward(&removed, now).await;

        Ok(DeleteDecisionResponse {
            nb_deleted: count.to_string(),
        })
    }

    /// Soft-delete every active decision matching `filter`.
    pub async fn delete_by_filter(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> Result<DeleteDecisionsResponse> {
        let (count, removed) = self.store.soft_delete_by_filter(filter, now).await?;
        self.metrics
            .decisions_deleted_total
            .fetch_add(count, Ordering::Relaxed);

        self.forward(&removed, now).await;

        Ok(DeleteDecisionsResponse { nb_deleted: count })
    }

    /// Hand removed decisions to the relay.
    ///
    /// The deletion is already committed, so failures here are logged and
    /// counted but never surface to the caller.
    async fn forward(&self, removed: &[StoredDecision], now: DateTime<Utc>) {
        if !self.relay.is_enabled() || removed.is_empty() {
            return;
        }

        let batch = match format_decisions(removed, false, now) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("failed to format deleted decisions for relay: {}", e);
                self.metrics
                    .relay_failures_total
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if let Err(e) = self.relay.forward(batch).await {
            tracing::warn!(count = removed.len(), "failed to relay deleted decisions: {}", e);
            self.metrics
                .relay_failures_total
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}
