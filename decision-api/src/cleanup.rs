//! Background cleanup task for ended decisions.
//!
//! Runs periodically to purge decisions that no pull can report any more,
//! and to evict idle rate limiter entries.

use crate::config::CleanupConfig;
use crate::error::StorageResult;
use crate::limits::RateLimits;
use crate::storage::DecisionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// How long ended decisions must stay in the store.
#[derive(Debug, Clone, Copy)]
pub struct PurgePolicy {
    /// Window reported to startup pulls.
    pub retention: chrono::Duration,
    /// Backdating applied to incremental pulls.
    pub expired_grace: chrono::Duration,
}

impl PurgePolicy {
    /// Latest end time that is safe to purge.
    ///
    /// Incremental pulls report expiries back to `last_pull - grace`, so the
    /// cutoff never passes that point for the slowest bouncer.
    pub fn cutoff(&self, now: DateTime<Utc>, oldest_pull: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let by_retention = now - self.retention;
        match oldest_pull {
            Some(pull) => by_retention.min(pull - self.expired_grace),
            None => by_retention,
        }
    }
}

/// Spawn a background cleanup task.
pub fn spawn_cleanup_task(
    store: Arc<dyn DecisionStore>,
    rate_limits: RateLimits,
    policy: PurgePolicy,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            match run_once(store.as_ref(), policy, Utc::now()).await {
                Ok(purged) if purged > 0 => {
                    tracing::info!("Cleanup: purged {} ended decisions", purged);
                }
                Ok(_) => tracing::debug!("Cleanup: nothing to purge"),
                Err(e) => tracing::error!("Cleanup error: {}", e),
            }
            rate_limits.shrink();
        }
    })
}

async fn run_once(store: &dyn DecisionStore, policy: PurgePolicy, now: DateTime<Utc>) -> StorageResult<u64> {
    let oldest_pull = store.oldest_last_pull().await?;
    let cutoff = policy.cutoff(now, oldest_pull);
    tracing::debug!(%cutoff, "purging ended decisions");
    store.purge_ended_before(cutoff).await
}
