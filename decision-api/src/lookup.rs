//! Filtered lookup of active decisions.
//!
//! Unlike stream pulls, lookups are never deduplicated: a caller asking
//! about one address sees every decision that applies to it.

use crate::error::Result;
use crate::format::format_decisions;
use crate::pull::PullTracker;
use crate::server::ApiMetrics;
use crate::storage::{Bouncer, DecisionFilter, DecisionStore};
use chrono::{DateTime, Utc};
use decision_types::Decision;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Serves the query endpoint.
#[derive(Clone)]
pub struct Lookup {
    store: Arc<dyn DecisionStore>,
    pulls: PullTracker,
    metrics: Arc<ApiMetrics>,
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lookup")
            .field("pulls", &self.pulls)
            .finish_non_exhaustive()
    }
}

impl Lookup {
    /// Create a lookup service over `store`.
    pub fn new(store: Arc<dyn DecisionStore>, pulls: PullTracker, metrics: Arc<ApiMetrics>) -> Self {
        Self {
            store,
            pulls,
            metrics,
        }
    }

    /// Active decisions matching `filter` at `now`.
    ///
    /// `with_body` is false for HEAD requests. Those return before the pull
    /// timestamp is refreshed; GET lookups refresh it at most once per
    /// throttle interval.
    pub async fn query(
        &self,
        bouncer: &Bouncer,
        filter: &DecisionFilter,
        with_body: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Decision>> {
        let records = self.store.query_decisions(filter, now).await?;
        let decisions = format_decisions(&records, false, now)?;

        self.metrics.lookups_total.fetch_add(1, Ordering::Relaxed);
        if decisions.is_empty() {
            self.metrics
                .lookups_without_decisions
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics
                .lookups_with_decisions
                .fetch_add(1, Ordering::Relaxed);
        }

        if !with_body {
            return Ok(decisions);
        }

        self.pulls.record_lookup(bouncer, now).await;
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::test_support::{at, new_decision, FlakyStore};
    use chrono::Duration;

    async fn setup() -> (SqliteStore, Lookup, Arc<ApiMetrics>, Bouncer) {
        let store = SqliteStore::in_memory().await.unwrap();
        let bouncer = store.create_bouncer("fw-1", "key").await.unwrap();
        let shared: Arc<dyn DecisionStore> = Arc::new(store.clone());
        let metrics = Arc::new(ApiMetrics::default());
        let lookup = Lookup::new(
            shared.clone(),
            PullTracker::new(shared, Duration::seconds(60)),
            metrics.clone(),
        );
        (store, lookup, metrics, bouncer)
    }

    fn for_value(value: &str) -> DecisionFilter {
        DecisionFilter {
            value: Some(value.to_string()),
            ..DecisionFilter::default()
        }
    }

    #[tokio::test]
    async fn lookup_is_not_deduplicated() {
        let (store, lookup, _, bouncer) = setup().await;
        store
            .insert_decision(new_decision("192.0.2.1", at(9, 0, 0), Duration::hours(4)))
            .await
            .unwrap();
        store
            .insert_decision(new_decision("192.0.2.1", at(9, 30, 0), Duration::hours(4)))
            .await
            .unwrap();
        store
            .insert_decision(new_decision("192.0.2.2", at(9, 30, 0), Duration::hours(4)))
            .await
            .unwrap();

        let found = lookup
            .query(&bouncer, &for_value("192.0.2.1"), true, at(10, 0, 0))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn hit_and_miss_counters() {
        let (store, lookup, metrics, bouncer) = setup().await;
        store
            .insert_decision(new_decision("192.0.2.1", at(9, 0, 0), Duration::hours(4)))
            .await
            .unwrap();

        lookup
            .query(&bouncer, &for_value("192.0.2.1"), true, at(10, 0, 0))
            .await
            .unwrap();
        lookup
            .query(&bouncer, &for_value("198.51.100.7"), true, at(10, 0, 0))
            .await
            .unwrap();

        assert_eq!(metrics.lookups_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.lookups_with_decisions.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.lookups_without_decisions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn head_lookup_does_not_touch_last_pull() {
        let (store, lookup, _, bouncer) = setup().await;
        lookup
            .query(&bouncer, &DecisionFilter::default(), false, at(10, 0, 0))
            .await
            .unwrap();

        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, None);
    }

    #[tokio::test]
    async fn get_lookup_refreshes_last_pull() {
        let (store, lookup, _, bouncer) = setup().await;
        lookup
            .query(&bouncer, &DecisionFilter::default(), true, at(10, 0, 0))
            .await
            .unwrap();

        let reloaded = store.get_bouncer(bouncer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_pull, Some(at(10, 0, 0)));
    }

    #[tokio::test]
    async fn pull_update_failure_does_not_fail_lookup() {
        let store = SqliteStore::in_memory().await.unwrap();
        let bouncer = store.create_bouncer("fw-1", "key").await.unwrap();
        store
            .insert_decision(new_decision("192.0.2.1", at(9, 0, 0), Duration::hours(4)))
            .await
            .unwrap();

        let flaky: Arc<dyn DecisionStore> =
            Arc::new(FlakyStore::failing(store, "update_bouncer_last_pull"));
        let lookup = Lookup::new(
            flaky.clone(),
            PullTracker::new(flaky, Duration::seconds(60)),
            Arc::new(ApiMetrics::default()),
        );

        let found = lookup
            .query(&bouncer, &DecisionFilter::default(), true, at(10, 0, 0))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
