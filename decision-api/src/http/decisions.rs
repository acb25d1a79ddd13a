//! Decision endpoints.

use crate::error::{ApiError, Result};
use crate::server::DecisionApi;
use crate::storage::DecisionFilter;
use crate::sync::SyncRequest;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

type Params = Query<HashMap<String, String>>;

/// `GET|HEAD /v1/decisions/stream`
pub async fn stream_handler(
    Extension(api): Extension<Arc<DecisionApi>>,
    method: Method,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let result = stream(&api, &method, &headers, &params).await;
    finish(&api, result)
}

async fn stream(
    api: &DecisionApi,
    method: &Method,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<Response> {
    api.check_global_limit()?;
    let bouncer = api.authenticate_bouncer(headers).await?;
    let request = SyncRequest::from_query(params);
    let result = api.sync().sync(&bouncer, &request, Utc::now()).await?;

    if *method == Method::HEAD {
        return Ok(StatusCode::OK.into_response());
    }
    Ok(Json(result).into_response())
}

/// `GET|HEAD /v1/decisions`
pub async fn query_handler(
    Extension(api): Extension<Arc<DecisionApi>>,
    method: Method,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let result = query(&api, &method, &headers, &params).await;
    finish(&api, result)
}

async fn query(
    api: &DecisionApi,
    method: &Method,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<Response> {
    api.check_global_limit()?;
    let bouncer = api.authenticate_bouncer(headers).await?;
    let filter = DecisionFilter::from_query(params);
    let with_body = *method != Method::HEAD;
    let decisions = api
        .lookup()
        .query(&bouncer, &filter, with_body, Utc::now())
        .await?;

    if !with_body {
        return Ok(StatusCode::OK.into_response());
    }
    Ok(Json(decisions).into_response())
}

/// `DELETE /v1/decisions/:decision_id`
pub async fn delete_by_id_handler(
    Extension(api): Extension<Arc<DecisionApi>>,
    Path(decision_id): Path<String>,
) -> Response {
    let result = delete_by_id(&api, &decision_id).await;
    finish(&api, result)
}

async fn delete_by_id(api: &DecisionApi, decision_id: &str) -> Result<Response> {
    api.check_global_limit()?;
    let response = api
        .deletions()
        .delete_by_id(decision_id, Utc::now())
        .await?;
    tracing::info!("deleted decision {}", decision_id);
    Ok(Json(response).into_response())
}

/// `DELETE /v1/decisions`
pub async fn delete_by_filter_handler(
    Extension(api): Extension<Arc<DecisionApi>>,
    Query(params): Params,
) -> Response {
    let result = delete_by_filter(&api, &params).await;
    finish(&api, result)
}

async fn delete_by_filter(api: &DecisionApi, params: &HashMap<String, String>) -> Result<Response> {
    api.check_global_limit()?;
    let filter = DecisionFilter::from_query(params);
    let response = api.deletions().delete_by_filter(&filter, Utc::now()).await?;
    tracing::info!("deleted {} decisions by filter", response.nb_deleted);
    Ok(Json(response).into_response())
}

fn finish(api: &DecisionApi, result: Result<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => {
            api.record_error(&e);
            ApiError::into_response(e)
        }
    }
}
