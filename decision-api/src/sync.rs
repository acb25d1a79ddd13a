//! Stream synchronization: what a bouncer must add and remove.
//!
//! A startup pull returns the full active snapshot plus everything that
//! ended within the store's retention window. An incremental pull returns
//! decisions created after the bouncer's last pull plus those that ended
//! since then. The expired window is backdated by a small grace period so
//! that an expiry racing the previous pull is reported twice rather than
//! never.

use crate::error::Result;
use crate::format::format_decisions;
use crate::pull::PullTracker;
use crate::server::ApiMetrics;
use crate::storage::{Bouncer, DecisionFilter, DecisionStore};
use chrono::{DateTime, Duration, Utc};
use decision_types::SyncResult;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Parsed stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Full snapshot instead of a delta.
    pub startup: bool,
    /// Collapse duplicates on (value, scope, type).
    pub dedup: bool,
    /// Filter applied to both legs.
    pub filter: DecisionFilter,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            startup: false,
            dedup: true,
            filter: DecisionFilter::default().with_default_scopes(),
        }
    }
}

impl SyncRequest {
    /// Parse query parameters.
    ///
    /// `startup` is only set by the literal `true`; `dedup` is only cleared
    /// by the literal `false`. Scopes default to `Ip` and `Range`.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let startup = params.get("startup").is_some_and(|v| v == "true");
        let dedup = params.get("dedup").map_or(true, |v| v != "false");
        Self {
            startup,
            dedup,
            filter: DecisionFilter::from_query(params).with_default_scopes(),
        }
    }
}

/// Computes sync results and advances pull timestamps.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn DecisionStore>,
    pulls: PullTracker,
    expired_grace: Duration,
    metrics: Arc<ApiMetrics>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("pulls", &self.pulls)
            .field("expired_grace", &self.expired_grace)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Create a coordinator over `store`.
    pub fn new(
        store: Arc<dyn DecisionStore>,
        pulls: PullTracker,
        expired_grace: Duration,
        metrics: Arc<ApiMetrics>,
    ) -> Self {
        Self {
            store,
            pulls,
            expired_grace,
            metrics,
        }
    }

    /// Compute the sync result for `bouncer` as of `now`.
    ///
    /// Any store or format failure aborts the pull before the bouncer's
    /// last pull is touched, so the next pull covers the same window.
    pub async fn sync(
        &self,
        bouncer: &Bouncer,
        request: &SyncRequest,
        now: DateTime<Utc>,
    ) -> Result<SyncResult> {
        let (new, ended) = if request.startup {
            let active = self.store.query_all_active(&request.filter, now).await?;
            let ended = self
                .store
                .query_recently_expired(&request.filter, now)
                .await?;
            (active, ended)
        } else {
            let last_pull = PullTracker::last_pull(bouncer);
            let created = self
                .store
                .query_created_since(last_pull, &request.filter, now)
                .await?;
            let ended = self
                .store
                .query_expired_since(last_pull - self.expired_grace, &request.filter, now)
                .await?;
            (created, ended)
        };

        let result = SyncResult {
            new: format_decisions(&new, request.dedup, now)?,
            deleted: format_decisions(&ended, request.dedup, now)?,
        };

        // Recorded before the response reaches the bouncer. A bouncer that
        // never receives this body must reconnect with startup=true.
        self.pulls.record_sync(bouncer, now).await?;

        self.metrics.pulls_total.fetch_add(1, Ordering::Relaxed);
        if request.startup {
            self.metrics
                .startup_pulls_total
                .fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            bouncer = %bouncer.name,
            startup = request.startup,
            new = result.new.len(),
            deleted = result.deleted.len(),
            "sync computed"
        );

        Ok(result)
    }
}
