//! Prometheus metrics endpoint.

use crate::server::DecisionApi;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
pub async fn metrics_handler(Extension(api): Extension<Arc<DecisionApi>>) -> impl IntoResponse {
    let body = render(&api);
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

fn render(api: &DecisionApi) -> String {
    let m = api.metrics();

    let bouncers = api.rate_limits().bouncer_keys_count();

    let pulls = m.pulls_total.load(Ordering::Relaxed);
    let startup_pulls = m.startup_pulls_total.load(Ordering::Relaxed);
    let lookups = m.lookups_total.load(Ordering::Relaxed);
    let with_decision = m.lookups_with_decisions.load(Ordering::Relaxed);
    let without_decision = m.lookups_without_decisions.load(Ordering::Relaxed);
    let deleted = m.decisions_deleted_total.load(Ordering::Relaxed);
    let relay_failures = m.relay_failures_total.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    format!(
        r#"# HELP decision_api_info Server information
# TYPE decision_api_info gauge
decision_api_info{{version="{version}"}} 1

# HELP decision_api_bouncers_active Bouncers seen within the rate limit window
# TYPE decision_api_bouncers_active gauge
decision_api_bouncers_active {bouncers}

# HELP decision_api_pulls_total Stream pulls answered
# TYPE decision_api_pulls_total counter
decision_api_pulls_total {pulls}

# HELP decision_api_startup_pulls_total Startup stream pulls answered
# TYPE decision_api_startup_pulls_total counter
decision_api_startup_pulls_total {startup_pulls}

# HELP decision_api_lookups_total Lookups answered
# TYPE decision_api_lookups_total counter
decision_api_lookups_total {lookups}

# HELP decision_api_lookups_with_decision_total Lookups matching at least one decision
# TYPE decision_api_lookups_with_decision_total counter
decision_api_lookups_with_decision_total {with_decision}

# HELP decision_api_lookups_without_decision_total Lookups matching no decision
# TYPE decision_api_lookups_without_decision_total counter
decision_api_lookups_without_decision_total {without_decision}

# HELP decision_api_decisions_deleted_total Decisions soft-deleted
# TYPE decision_api_decisions_deleted_total counter
decision_api_decisions_deleted_total {deleted}

# HELP decision_api_relay_failures_total Deletion batches not relayed
# TYPE decision_api_relay_failures_total counter
decision_api_relay_failures_total {relay_failures}

# HELP decision_api_rate_limit_hits_total Total rate limit rejections
# TYPE decision_api_rate_limit_hits_total counter
decision_api_rate_limit_hits_total {rate_limits}

# HELP decision_api_errors_total Requests failed with a server error
# TYPE decision_api_errors_total counter
decision_api_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
