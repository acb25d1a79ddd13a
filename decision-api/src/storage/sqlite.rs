//! SQLite storage backend for decision-api.

use super::{
    Bouncer, DecisionFilter, DecisionStore, IdentityResolver, NewDecision, StoredDecision,
};
use crate::auth::hash_api_key;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use decision_types::{BouncerId, DecisionId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;

const DECISION_COLUMNS: &str =
    "id, uuid, value, scope, kind, origin, scenario, created_at, until, deleted_at";

/// Effective end of a decision: expiry, or deletion if earlier.
const ENDS_AT: &str = "MIN(until, COALESCE(deleted_at, until))";

/// Default window during which ended decisions are reported to startup pulls.
const DEFAULT_EXPIRED_RETENTION_SECS: i64 = 3600;

/// SQLite-based decision and bouncer storage.
///
/// Uses WAL mode for concurrent reads/writes. Timestamps are stored as
/// nanoseconds since the Unix epoch so that a decision created just after a
/// pull never compares equal to that pull.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    expired_retention: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(path.to_str().unwrap_or("decisions.db"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            expired_retention: Duration::seconds(DEFAULT_EXPIRED_RETENTION_SECS),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            expired_retention: Duration::seconds(DEFAULT_EXPIRED_RETENTION_SECS),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Set the window used by [`DecisionStore::query_recently_expired`].
    pub fn with_expired_retention(mut self, retention: Duration) -> Self {
        self.expired_retention = retention;
        self
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL,
                scope TEXT NOT NULL,
                kind TEXT NOT NULL,
                origin TEXT NOT NULL,
                scenario TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                until INTEGER NOT NULL,
                deleted_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bouncers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                api_key_hash TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                last_pull INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_until ON decisions(until)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_decisions_created_at ON decisions(created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_decisions_value ON decisions(value, scope, kind)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a bouncer under the hash of its API key.
    pub async fn create_bouncer(&self, name: &str, api_key: &str) -> StorageResult<Bouncer> {
        let row = sqlx::query_as::<_, BouncerRow>(
            r#"
            INSERT INTO bouncers (name, api_key_hash, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, last_pull
            "#,
        )
        .bind(name)
        .bind(hash_api_key(api_key))
        .bind(to_nanos(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Get a bouncer by id.
    pub async fn get_bouncer(&self, id: BouncerId) -> StorageResult<Option<Bouncer>> {
        let row = sqlx::query_as::<_, BouncerRow>(
            "SELECT id, name, last_pull FROM bouncers WHERE id = ?1",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Bouncer::try_from).transpose()
    }

    async fn fetch_decisions(
        &self,
        mut qb: QueryBuilder<'_, Sqlite>,
    ) -> StorageResult<Vec<StoredDecision>> {
        qb.push(" ORDER BY id ASC");
        let rows: Vec<DecisionRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(StoredDecision::try_from).collect()
    }
}

fn select_decisions<'a>() -> QueryBuilder<'a, Sqlite> {
    QueryBuilder::new(format!(
        "SELECT {DECISION_COLUMNS} FROM decisions WHERE 1 = 1"
    ))
}

fn push_active(qb: &mut QueryBuilder<'_, Sqlite>, now: DateTime<Utc>) {
    qb.push(" AND deleted_at IS NULL AND until > ")
        .push_bind(to_nanos(now));
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &DecisionFilter) {
    if !filter.scopes.is_empty() {
        qb.push(" AND LOWER(scope) IN (");
        let mut scopes = qb.separated(", ");
        for scope in &filter.scopes {
            scopes.push_bind(scope.to_lowercase());
        }
        scopes.push_unseparated(")");
    }
    if let Some(value) = &filter.value {
        qb.push(" AND value = ").push_bind(value.clone());
    }
    if let Some(kind) = &filter.kind {
        qb.push(" AND kind = ").push_bind(kind.clone());
    }
    if !filter.origins.is_empty() {
        qb.push(" AND origin IN (");
        let mut origins = qb.separated(", ");
        for origin in &filter.origins {
            origins.push_bind(origin.clone());
        }
        origins.push_unseparated(")");
    }
    if !filter.scenarios_containing.is_empty() {
        qb.push(" AND (");
        let mut any = qb.separated(" OR ");
        for fragment in &filter.scenarios_containing {
            any.push("scenario LIKE ")
                .push_bind_unseparated(format!("%{fragment}%"));
        }
        any.push_unseparated(")");
    }
    for fragment in &filter.scenarios_not_containing {
        qb.push(" AND scenario NOT LIKE ")
            .push_bind(format!("%{fragment}%"));
    }
}

#[async_trait]
impl DecisionStore for SqliteStore {
    async fn insert_decision(&self, new: NewDecision) -> StorageResult<StoredDecision> {
        if new.duration <= Duration::zero() {
            return Err(StorageError::InvalidDecision {
                reason: "duration must be positive".to_string(),
            });
        }
        if new.value.is_empty() || new.scope.is_empty() {
            return Err(StorageError::InvalidDecision {
                reason: "value and scope are required".to_string(),
            });
        }
        let out_of_range = || StorageError::InvalidDecision {
            reason: "timestamps must fall between 1677 and 2262".to_string(),
        };
        let until = new
            .created_at
            .checked_add_signed(new.duration)
            .ok_or_else(out_of_range)?;
        let created_ns = new.created_at.timestamp_nanos_opt().ok_or_else(out_of_range)?;
        let until_ns = until.timestamp_nanos_opt().ok_or_else(out_of_range)?;

        let row = sqlx::query_as::<_, DecisionRow>(&format!(
            r#"
            INSERT INTO decisions (uuid, value, scope, kind, origin, scenario, created_at, until)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {DECISION_COLUMNS}
            "#
        ))
        .bind(decision_types::DecisionUuid::new().to_string())
        .bind(&new.value)
        .bind(&new.scope)
        .bind(&new.kind)
        .bind(&new.origin)
        .bind(&new.scenario)
        .bind(created_ns)
        .bind(until_ns)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn query_all_active(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        let mut qb = select_decisions();
        push_active(&mut qb, now);
        push_filter(&mut qb, filter);
        self.fetch_decisions(qb).await
    }

    async fn query_recently_expired(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        self.query_expired_since(now - self.expired_retention, filter, now)
            .await
    }

    async fn query_expired_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        let mut qb = select_decisions();
        qb.push(format!(" AND {ENDS_AT} >= "))
            .push_bind(to_nanos(since));
        qb.push(format!(" AND {ENDS_AT} <= "))
            .push_bind(to_nanos(now));
        push_filter(&mut qb, filter);
        self.fetch_decisions(qb).await
    }

    async fn query_created_since(
        &self,
        since: DateTime<Utc>,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredDecision>> {
        let mut qb = select_decisions();
        qb.push(" AND created_at > ")
            .push_bind(to_nanos(since));
        push_active(&mut qb, now);
        push_filter(&mut qb, filter);
        self.fetch_decisions(qb).await
    }

    async fn soft_delete_by_id(
        &self,
        id: DecisionId,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)> {
        let rows = sqlx::query_as::<_, DecisionRow>(&format!(
            r#"
            UPDATE decisions SET deleted_at = ?1
            WHERE id = ?2 AND deleted_at IS NULL
            RETURNING {DECISION_COLUMNS}
            "#
        ))
        .bind(to_nanos(now))
        .bind(id.value())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(StorageError::NotFound { id });
        }

        let deleted = rows
            .into_iter()
            .map(StoredDecision::try_from)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((deleted.len() as u64, deleted))
    }

    async fn soft_delete_by_filter(
        &self,
        filter: &DecisionFilter,
        now: DateTime<Utc>,
    ) -> StorageResult<(u64, Vec<StoredDecision>)> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE decisions SET deleted_at = ");
        qb.push_bind(to_nanos(now));
        qb.push(" WHERE 1 = 1");
        push_active(&mut qb, now);
        push_filter(&mut qb, filter);
        qb.push(format!(" RETURNING {DECISION_COLUMNS}"));

        let rows: Vec<DecisionRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut deleted = rows
            .into_iter()
            .map(StoredDecision::try_from)
            .collect::<StorageResult<Vec<_>>>()?;
        // RETURNING order is unspecified
        deleted.sort_by_key(|d| d.id);
        Ok((deleted.len() as u64, deleted))
    }

    async fn update_bouncer_last_pull(
        &self,
        bouncer: BouncerId,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE bouncers SET last_pull = ?1
            WHERE id = ?2 AND (last_pull IS NULL OR last_pull < ?1)
            "#,
        )
        .bind(to_nanos(at))
        .bind(bouncer.value())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn oldest_last_pull(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let oldest: Option<i64> =
            sqlx::query_scalar("SELECT MIN(last_pull) FROM bouncers WHERE last_pull IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(oldest.map(from_nanos))
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM decisions WHERE {ENDS_AT} < ?1"))
            .bind(to_nanos(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl IdentityResolver for SqliteStore {
    async fn resolve_api_key(&self, api_key: &str) -> StorageResult<Option<Bouncer>> {
        let row = sqlx::query_as::<_, BouncerRow>(
            "SELECT id, name, last_pull FROM bouncers WHERE api_key_hash = ?1",
        )
        .bind(hash_api_key(api_key))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Bouncer::try_from).transpose()
    }
}

/// Internal row type for decision queries.
#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: i64,
    uuid: String,
    value: String,
    scope: String,
    kind: String,
    origin: String,
    scenario: String,
    created_at: i64,
    until: i64,
    deleted_at: Option<i64>,
}

/// Internal row type for bouncer queries.
#[derive(sqlx::FromRow)]
struct BouncerRow {
    id: i64,
    name: String,
    last_pull: Option<i64>,
}

/// Nanoseconds since the epoch, saturating outside 1677..2262.
fn to_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt()
        .unwrap_or(if at.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

fn from_nanos(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(ns)
}

impl TryFrom<DecisionRow> for StoredDecision {
    type Error = StorageError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        Ok(StoredDecision {
            id: DecisionId::new(row.id),
            uuid: row.uuid.parse().map_err(|_| StorageError::Corrupt {
                reason: format!("invalid uuid for decision {}", row.id),
            })?,
            value: row.value,
            scope: row.scope,
            kind: row.kind,
            origin: row.origin,
            scenario: row.scenario,
            created_at: from_nanos(row.created_at),
            until: from_nanos(row.until),
            deleted_at: row.deleted_at.map(from_nanos),
        })
    }
}

impl TryFrom<BouncerRow> for Bouncer {
    type Error = StorageError;

    fn try_from(row: BouncerRow) -> Result<Self, Self::Error> {
        Ok(Bouncer {
            id: BouncerId::new(row.id),
            name: row.name,
            last_pull: row.last_pull.map(from_nanos),
        })
    }
}
