//! Bookkeeping of each bouncer's last successful pull.
//!
//! Sync pulls always record their start time. Plain lookups are throttled so
//! that high-frequency pollers do not turn every read into a write.

use crate::error::StorageResult;
use crate::storage::{Bouncer, DecisionStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Reads and advances bouncer pull timestamps.
#[derive(Clone)]
pub struct PullTracker {
    store: Arc<dyn DecisionStore>,
    lookup_throttle: Duration,
}

impl std::fmt::Debug for PullTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullTracker")
            .field("lookup_throttle", &self.lookup_throttle)
            .finish_non_exhaustive()
    }
}

impl PullTracker {
    /// Create a tracker writing through `store`.
    pub fn new(store: Arc<dyn DecisionStore>, lookup_throttle: Duration) -> Self {
        Self {
            store,
            lookup_throttle,
        }
    }

    /// Lower bound for an incremental pull.
    ///
    /// A bouncer that never pulled starts from the Unix epoch.
    pub fn last_pull(bouncer: &Bouncer) -> DateTime<Utc> {
        bouncer.last_pull.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Record a successful sync that started at `started_at`.
    pub async fn record_sync(&self, bouncer: &Bouncer, started_at: DateTime<Utc>) -> StorageResult<()> {
        self.store
            .update_bouncer_last_pull(bouncer.id, started_at)
            .await
    }

    /// Whether a lookup at `now` should refresh the pull timestamp.
    pub fn lookup_due(&self, bouncer: &Bouncer, now: DateTime<Utc>) -> bool {
        match bouncer.last_pull {
            Some(last) => now - last >= self.lookup_throttle,
            None => true,
        }
    }

    /// Record a lookup, throttled.
    ///
    /// Failures are logged and swallowed. Returns whether a write succeeded.
    pub async fn record_lookup(&self, bouncer: &Bouncer, now: DateTime<Utc>) -> bool {
        if !self.lookup_due(bouncer, now) {
            return false;
        }
        match self.store.update_bouncer_last_pull(bouncer.id, now).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("failed to update bouncer '{}' last pull: {}", bouncer.name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::test_support::{at, FlakyStore};

    async fn setup() -> (SqliteStore, PullTracker, Bouncer) {
        let store = SqliteStore::in_memory().await.unwrap();
        let bouncer = store.create_bouncer("fw-1", "key").await.unwrap();
        let tracker = PullTracker::new(Arc::new(store.clone()), Duration::seconds(60));
        (store, tracker, bouncer)
    }

    #[test]
    fn never_pulled_starts_at_epoch() {
        let bouncer = Bouncer {
            id: decision_types::BouncerId::new(1),
            name: "fw".into(),
            last_pull: None,
        };
        assert_eq!(PullTracker::last_pull(&bouncer), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn sync_records_start_time() {
        let (store, tracker, bouncer) = setup().await;
        tracker.record_sync(&bouncer, at(10, 1, 0)).await.unwrap();

        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, Some(at(10, 1, 0)));
    }

    #[tokio::test]
    async fn lookup_is_throttled_to_one_write_per_minute() {
        let (store, tracker, mut bouncer) = setup().await;
        bouncer.last_pull = Some(at(10, 0, 0));
        store
            .update_bouncer_last_pull(bouncer.id, at(10, 0, 0))
            .await
            .unwrap();

        assert!(!tracker.record_lookup(&bouncer, at(10, 0, 59)).await);
        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, Some(at(10, 0, 0)));

        assert!(tracker.record_lookup(&bouncer, at(10, 1, 0)).await);
        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, Some(at(10, 1, 0)));
    }

    #[tokio::test]
    async fn first_lookup_always_writes() {
        let (store, tracker, bouncer) = setup().await;
        assert!(tracker.record_lookup(&bouncer, at(9, 0, 0)).await);

        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, Some(at(9, 0, 0)));
    }

    #[tokio::test]
    async fn lookup_write_failure_is_swallowed() {
        let (store, _, bouncer) = setup().await;
        let flaky = FlakyStore::failing(store, "update_bouncer_last_pull");
        let tracker = PullTracker::new(Arc::new(flaky), Duration::seconds(60));

        assert!(!tracker.record_lookup(&bouncer, at(9, 0, 0)).await);
    }
}
