//! Storage layer for decision-api.
//!
//! The core only depends on the [`DecisionStore`] and [`IdentityResolver`]
//! contracts. [`SqliteStore`] is the bundled implementation.

mod filter;
mod sqlite;

pub use filter::DecisionFilter;
pub use sqlite::SqliteStore;

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use decision_types::{BouncerId, DecisionId, DecisionUuid};

/// A decision as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDecision {
    /// Store-assigned identifier.
    pub id: DecisionId,
    /// Stable external identifier.
    pub uuid: DecisionUuid,
    /// Target being acted on.
    pub value: String,
    /// Classification of `value`.
    pub scope: String,
    /// Action (`ban`, `captcha`, ...).
    pub kind: String,
    /// Subsystem that issued it.
    pub origin: String,
    /// Rule that produced it.
    pub scenario: String,
    /// When the store accepted it.
    pub created_at: DateTime<Utc>,
    /// Natural expiry.
    pub until: DateTime<Utc>,
    /// When it was soft-deleted, if ever.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a decision at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    /// Still enforced.
    Active,
    /// Reached its expiry.
    Expired {
        /// Expiry instant.
        at: DateTime<Utc>,
    },
    /// Removed before its expiry.
    Deleted {
        /// Deletion instant.
        at: DateTime<Utc>,
    },
}

impl StoredDecision {
    /// Effective end: the earlier of expiry and deletion.
    pub fn ends_at(&self) -> DateTime<Utc> {
        match self.deleted_at {
            Some(deleted) => deleted.min(self.until),
            None => self.until,
        }
    }

    /// Lifecycle state at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> DecisionState {
        if self.ends_at() > now {
            return DecisionState::Active;
        }
        match self.deleted_at {
            Some(deleted) if deleted < self.until => DecisionState::Deleted { at: deleted },
            _ => DecisionState::Expired { at: self.until },
        }
    }
}

/// Request to store a new decision.
#[derive(Debug, Clone)]
pub struct NewDecision {
    /// Target being acted on.
    pub value: String,
    /// Classification of `value`.
    pub scope: String,
    /// Action.
    pub kind: String,
    /// Issuing subsystem.
    pub origin: String,
    /// Producing rule.
    pub scenario: String,
    /// How long the decision lasts; must be positive.
    pub duration: Duration,
    /// Creation instant (expiry is `created_at + duration`).
    pub created_at: DateTime<Utc>,
}

/// An authenticated bouncer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bouncer {
    /// Store-assigned identifier.
    pub id: BouncerId,
    /// Display name.
    pub name: String,
    /// Last successful pull, if the bouncer ever pulled.
    pub last_pull: Option<DateTime<Utc>>,
}

/// Store contract required by the synchronization core.
///
/// Every query takes `now` explicitly so that "active" and "ended" are
/// evaluated against the instant the request started.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Persist a new decision.
    async fn insert_decision(&self, new: NewDecision) -> StorageResult<StoredDecision>;

    /// All decisions active at `now` matching the filter.
    async fn query_all_active(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>>;

    /// Filtered lookup for the query endpoint.
    ///
    /// Defaults to the full snapshot query; stores with a richer lookup
    /// planner can override it.
    async fn query_decisions(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.query_all_active(filter, now).await
    }

    /// Decisions that ended within the store's retention window before `now`.
    async fn query_recently_expired(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>>;

    /// Decisions whose end falls in `[since, now]`.
    async fn query_expired_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>>;

    /// Decisions active at `now` that were created strictly after `since`.
    async fn query_created_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>>;

    /// Soft-delete one decision. Returns the count and the removed records.
    async fn soft_delete_by_id(
        &self,
        id: DecisionId,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)>;

    /// Soft-delete every active decision matching the filter.
    async fn soft_delete_by_filter(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)>;

    /// Move a bouncer's last pull forward to `at`.
    ///
    /// Never moves it backwards.
    async fn update_bouncer_last_pull(
        &self,
        bouncer: BouncerId,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Earliest last pull across bouncers that have pulled at least once.
    async fn oldest_last_pull(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// Cheap round trip used by the health check.
    async fn ping(&self) -> StorageResult<()>;

    /// Remove decisions that ended before `cutoff`.
    ///
    /// Returns the number of decisions purged.
    async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
}

/// Identity contract: API key to bouncer.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve an API key. `None` means unauthenticated.
    async fn resolve_api_key(&self, api_key: &str) -> StorageResult<Option<Bouncer>>;
}
