//! Health check endpoint.

use crate::server::DecisionApi;
use crate::storage::DecisionStore;
use axum::{http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok`, or `degraded` when the store cannot be reached.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Whether the decision store answered a round trip.
    pub store_reachable: bool,
    /// Whether deletions are forwarded upstream.
    pub relay_enabled: bool,
    /// Stream pulls served since startup.
    pub pulls_total: u64,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
///
/// Answers 503 while the store is unreachable so that load balancers stop
/// routing bouncers here.
pub async fn health_handler(
    Extension(api): Extension<Arc<DecisionApi>>,
) -> (StatusCode, Json<HealthStatus>) {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let store_reachable = match api.store_arc().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("health check: store unreachable: {}", e);
            false
        }
    };
    let (code, status) = if store_reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_reachable,
        relay_enabled: api.config().relay.enabled,
        pulls_total: api.metrics().pulls_total.load(Ordering::Relaxed),
        uptime_seconds: uptime,
    };
    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::DeletionRelay;
    use crate::config::Config;
    use crate::storage::SqliteStore;
    use crate::test_support::FlakyStore;

    async fn api_over(store: Arc<dyn DecisionStore>, identity: SqliteStore) -> Arc<DecisionApi> {
        let api = DecisionApi::new(
            Config::default(),
            store,
            Arc::new(identity),
            DeletionRelay::Disabled,
        )
        .unwrap();
        Arc::new(api)
    }

    #[tokio::test]
    async fn reachable_store_is_ok() {
        let store = SqliteStore::in_memory().await.unwrap();
        let api = api_over(Arc::new(store.clone()), store).await;
        api.metrics().pulls_total.fetch_add(2, Ordering::Relaxed);

        let (code, Json(status)) = health_handler(Extension(api)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status.status, "ok");
        assert!(status.store_reachable);
        assert_eq!(status.pulls_total, 2);
    }

    #[tokio::test]
    async fn unreachable_store_is_degraded() {
        let store = SqliteStore::in_memory().await.unwrap();
        let flaky = FlakyStore::failing(store.clone(), "ping");
        let api = api_over(Arc::new(flaky), store).await;

        let (code, Json(status)) = health_handler(Extension(api)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status.status, "degraded");
        assert!(!status.store_reachable);

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"store_reachable\":false"));
    }
}
