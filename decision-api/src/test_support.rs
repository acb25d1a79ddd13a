//! Shared helpers for unit tests.

use crate::error::{StorageError, StorageResult};
use crate::storage::{DecisionFilter, DecisionStore, NewDecision, SqliteStore, StoredDecision};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use decision_types::{BouncerId, DecisionId};

/// A fixed instant on the test day.
pub(crate) fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
}

/// A ban on an address.
pub(crate) fn new_decision(value: &str, created_at: DateTime<Utc>, duration: Duration) -> NewDecision {
    NewDecision {
        value: value.to_string(),
        scope: "Ip".to_string(),
        kind: "ban".to_string(),
        origin: "local".to_string(),
        scenario: "crowdsecurity/ssh-bf".to_string(),
        duration,
        created_at,
    }
}

/// Store wrapper that fails one named operation.
pub(crate) struct FlakyStore {
    inner: SqliteStore,
    fail_on: &'static str,
}

impl FlakyStore {
    pub(crate) fn failing(inner: SqliteStore, fail_on: &'static str) -> Self {
        Self { inner, fail_on }
    }

    fn check(&self, operation: &str) -> StorageResult<()> {
        if operation == self.fail_on {
            Err(StorageError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DecisionStore for FlakyStore {
    async fn insert_decision(&self, new: NewDecision) -> StorageResult<StoredDecision> {
        self.check("insert_decision")?;
        self.inner.insert_decision(new).await
    }

    async fn query_all_active(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.check("query_all_active")?;
        self.inner.query_all_active(filter, now).await
    }

    async fn query_recently_expired(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.check("query_recently_expired")?;
        self.inner.query_recently_expired(filter, now).await
    }

    async fn query_expired_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.check("query_expired_since")?;
        self.inner.query_expired_since(since, filter, now).await
    }

    async fn query_created_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.check("query_created_since")?;
        self.inner.query_created_since(since, filter, now).await
    }

    async fn soft_delete_by_id(
        &self,
        id: DecisionId,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)> {
        self.check("soft_delete_by_id")?;
        self.inner.soft_delete_by_id(id, now).await
    }

    async fn soft_delete_by_filter(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)> {
        self.check("soft_delete_by_filter")?;
        self.inner.soft_delete_by_filter(filter, now).await
    }

    async fn update_bouncer_last_pull(
        &self,
        bouncer: BouncerId,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check("update_bouncer_last_pull")?;
        self.inner.update_bouncer_last_pull(bouncer, at).await
    }

    async fn oldest_last_pull(&self) -> StorageResult<Option<DateTime<Utc>>> {
        self.check("oldest_last_pull")?;
        self.inner.oldest_last_pull().await
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check("ping")?;
        self.inner.ping().await
    }

    async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        self.check("purge_ended_before")?;
        self.inner.purge_ended_before(cutoff).await
    }
}
