//! Main DecisionApi coordination.
//!
//! DecisionApi owns the store handles, the sync, lookup and deletion
//! services, rate limiters and metrics shared by every HTTP handler.

use crate::auth;
use crate::broadcast::DeletionRelay;
use crate::config::{Config, ConfigError};
use crate::deletion::Deletions;
use crate::error::{ApiError, Result};
use crate::limits::RateLimits;
use crate::lookup::Lookup;
use crate::pull::PullTracker;
use crate::storage::{Bouncer, DecisionStore, IdentityResolver};
use crate::sync::SyncCoordinator;
use axum::http::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Operational metrics for monitoring API activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct ApiMetrics {
    /// Stream pulls answered successfully.
    pub pulls_total: AtomicU64,
    /// Of those, full startup pulls.
    pub startup_pulls_total: AtomicU64,
    /// Lookups answered.
    pub lookups_total: AtomicU64,
    /// Lookups that matched at least one decision.
    pub lookups_with_decisions: AtomicU64,
    /// Lookups that matched nothing.
    pub lookups_without_decisions: AtomicU64,
    /// Decisions soft-deleted through the API.
    pub decisions_deleted_total: AtomicU64,
    /// Deletion batches that could not be relayed.
    pub relay_failures_total: AtomicU64,
    /// Requests rejected by a rate limiter.
    pub rate_limit_hits: AtomicU64,
    /// Requests that failed with a server error.
    pub errors_total: AtomicU64,
}

/// Main API server state.
pub struct DecisionApi {
    config: Config,
    store: Arc<dyn DecisionStore>,
    identity: Arc<dyn IdentityResolver>,
    sync: SyncCoordinator,
    lookup: Lookup,
    deletions: Deletions,
    rate_limits: RateLimits,
    metrics: Arc<ApiMetrics>,
}

impl std::fmt::Debug for DecisionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionApi")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl DecisionApi {
    /// Wire the services together over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured duration is out of range.
    pub fn new(
        config: Config,
        store: Arc<dyn DecisionStore>,
        identity: Arc<dyn IdentityResolver>,
        relay: DeletionRelay,
    ) -> std::result::Result<Self, ConfigError> {
        let metrics = Arc::new(ApiMetrics::default());
        let pulls = PullTracker::new(store.clone(), config.sync.lookup_pull_throttle()?);
        let sync = SyncCoordinator::new(
            store.clone(),
            pulls.clone(),
            config.sync.expired_grace()?,
            metrics.clone(),
        );
        let lookup = Lookup::new(store.clone(), pulls, metrics.clone());
        let deletions = Deletions::new(store.clone(), relay, metrics.clone());
        let rate_limits = RateLimits::new(&config.limits);

        Ok(Self {
            config,
            store,
            identity,
            sync,
            lookup,
            deletions,
            rate_limits,
            metrics,
        })
    }

    /// Get the API configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a clone of the store Arc for background tasks.
    pub fn store_arc(&self) -> Arc<dyn DecisionStore> {
        self.store.clone()
    }

    /// Stream synchronization service.
    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    /// Lookup service.
    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    /// Deletion service.
    pub fn deletions(&self) -> &Deletions {
        &self.deletions
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }

    /// Apply the global request limit.
    pub fn check_global_limit(&self) -> Result<()> {
        self.rate_limits.check_global().map_err(|e| {
            self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            ApiError::RateLimited {
                reason: e.to_string(),
            }
        })
    }

    /// Resolve the calling bouncer and apply its pull limit.
    pub async fn authenticate_bouncer(&self, headers: &HeaderMap) -> Result<Bouncer> {
        let bouncer = auth::authenticate(self.identity.as_ref(), headers).await?;
        self.rate_limits.check_bouncer(&bouncer.id).map_err(|e| {
            self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(bouncer = %bouncer.name, "rate limited");
            ApiError::RateLimited {
                reason: e.to_string(),
            }
        })?;
        Ok(bouncer)
    }

    /// Count a failed request if it is a server error.
    pub fn record_error(&self, error: &ApiError) {
        if error.status().is_server_error() {
            self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }
}
