//! HTTP endpoints for decision-api.
//!
//! Serves the bouncer-facing decision API plus health and metrics.
//!
//! The DELETE routes carry no credential of their own. A filterless
//! `DELETE /v1/decisions` removes every active decision, so either run the
//! listener behind an authenticating proxy or set
//! `http.deletions_enabled = false`.

mod decisions;
pub mod health;
mod metrics;

use crate::server::DecisionApi;
use axum::{
    routing::{delete, get},
    Extension, Router,
};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
///
/// GET routes also answer HEAD; the handlers drop the body themselves.
pub fn build_router(api: Arc<DecisionApi>) -> Router {
    let decisions_route = if api.config().http.deletions_enabled {
        get(decisions::query_handler).delete(decisions::delete_by_filter_handler)
    } else {
        get(decisions::query_handler)
    };

    let mut router = Router::new()
        .route("/v1/decisions", decisions_route)
        .route("/v1/decisions/stream", get(decisions::stream_handler))
        .route("/health", get(health::health_handler));

    if api.config().http.deletions_enabled {
        router = router.route(
            "/v1/decisions/:decision_id",
            delete(decisions::delete_by_id_handler),
        );
    }

    if api.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::API_KEY_HEADER;
    use crate::broadcast::DeletionRelay;
    use crate::config::Config;
    use crate::storage::{DecisionStore, NewDecision, SqliteStore};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use chrono::{Duration, Utc};
    use tower::util::ServiceExt;

    const KEY: &str = "test-key";

    async fn test_api() -> (SqliteStore, Arc<DecisionApi>) {
        api_with(Config::default()).await
    }

    async fn api_with(config: Config) -> (SqliteStore, Arc<DecisionApi>) {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_bouncer("fw-1", KEY).await.unwrap();
        let api = DecisionApi::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            DeletionRelay::Disabled,
        )
        .unwrap();
        (store, Arc::new(api))
    }

    async fn seed(store: &SqliteStore, value: &str) {
        store
            .insert_decision(NewDecision {
                value: value.to_string(),
                scope: "Ip".to_string(),
                kind: "ban".to_string(),
                origin: "cscli".to_string(),
                scenario: "manual ban".to_string(),
                duration: Duration::hours(4),
                created_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();
    }

    async fn send(api: Arc<DecisionApi>, method: Method, uri: &str, key: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header(API_KEY_HEADER, key);
        }
        build_router(api)
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (_, api) = test_api().await;
        let response = send(api, Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let (_, api) = test_api().await;
        let response = send(api, Method::GET, "/metrics", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stream_requires_api_key() {
        let (_, api) = test_api().await;

        let missing = send(api.clone(), Method::GET, "/v1/decisions/stream", None).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(missing).await["message"], "not allowed");

        let wrong = send(api, Method::GET, "/v1/decisions/stream", Some("nope")).await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn startup_stream_returns_new_and_deleted_arrays() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;

        let response = send(
            api,
            Method::GET,
            "/v1/decisions/stream?startup=true",
            Some(KEY),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let new = body["new"].as_array().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0]["value"], "192.0.2.1");
        assert_eq!(new[0]["type"], "ban");
        assert_eq!(new[0]["scope"], "Ip");
        assert!(new[0]["uuid"].is_string());
        assert_eq!(body["deleted"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn head_stream_has_no_body() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;

        let response = send(api, Method::HEAD, "/v1/decisions/stream", Some(KEY)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn head_lookup_matches_get_status() {
        let (_, api) = test_api().await;

        let get = send(api.clone(), Method::GET, "/v1/decisions", Some(KEY)).await;
        let head = send(api.clone(), Method::HEAD, "/v1/decisions", Some(KEY)).await;
        assert_eq!(get.status(), head.status());

        let denied = send(api, Method::HEAD, "/v1/decisions", None).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lookup_filters_by_value() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;
        seed(&store, "192.0.2.2").await;

        let response = send(api, Method::GET, "/v1/decisions?value=192.0.2.2", Some(KEY)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let found = body.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["value"], "192.0.2.2");
    }

    #[tokio::test]
    async fn empty_lookup_is_an_empty_array() {
        let (_, api) = test_api().await;
        let response = send(api, Method::GET, "/v1/decisions", Some(KEY)).await;
        assert_eq!(json_body(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn delete_by_id_rejects_non_integer() {
        let (_, api) = test_api().await;
        let response = send(api, Method::DELETE, "/v1/decisions/abc", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_by_id_returns_string_count() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;

        let response = send(api.clone(), Method::DELETE, "/v1/decisions/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["nb_deleted"], "1");

        let again = send(api, Method::DELETE, "/v1/decisions/1", None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_by_filter_returns_numeric_count() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;
        seed(&store, "192.0.2.1").await;
        seed(&store, "192.0.2.2").await;

        let response = send(api, Method::DELETE, "/v1/decisions?value=192.0.2.1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["nb_deleted"], 2);
    }

    #[tokio::test]
    async fn delete_routes_can_be_switched_off() {
        let mut config = Config::default();
        config.http.deletions_enabled = false;
        let (store, api) = api_with(config).await;
        seed(&store, "192.0.2.1").await;

        let by_filter = send(api.clone(), Method::DELETE, "/v1/decisions", None).await;
        assert_eq!(by_filter.status(), StatusCode::METHOD_NOT_ALLOWED);
        let by_id = send(api.clone(), Method::DELETE, "/v1/decisions/1", None).await;
        assert_eq!(by_id.status(), StatusCode::NOT_FOUND);

        let lookup = send(api, Method::GET, "/v1/decisions", Some(KEY)).await;
        assert_eq!(json_body(lookup).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_decision_appears_in_next_incremental_pull() {
        let (store, api) = test_api().await;
        seed(&store, "192.0.2.1").await;

        let first = send(api.clone(), Method::GET, "/v1/decisions/stream", Some(KEY)).await;
        assert_eq!(json_body(first).await["new"].as_array().unwrap().len(), 1);

        send(api.clone(), Method::DELETE, "/v1/decisions/1", None).await;

        let second = send(api, Method::GET, "/v1/decisions/stream", Some(KEY)).await;
        let body = json_body(second).await;
        assert_eq!(body["new"], serde_json::json!([]));
        assert_eq!(body["deleted"][0]["value"], "192.0.2.1");
    }
}
