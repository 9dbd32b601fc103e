//! The stateless router process: maps a key to its owning shard via the
//! hash ring and proxies the request through unchanged. The router holds
//! no data of its own — restarting it loses nothing but in-flight requests.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::dto::{KeyQuery, RouteResponse, RouterHealth};
use crate::error::ApiError;
use crate::ring::HashRing;

pub struct RouterState {
    pub ring: HashRing,
    pub vnodes: usize,
    pub client: reqwest::Client,
}

pub fn router_app(state: Arc<RouterState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/route", get(route))
        .route("/kv", get(proxy_get).put(proxy_put).delete(proxy_delete))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<RouterHealth> {
    Json(RouterHealth {
        status: "ok",
        shards: state.ring.shards().to_vec(),
        vnodes: state.vnodes,
    })
}

fn require_key(query: &KeyQuery) -> Result<&str, ApiError> {
    match &query.key {
        Some(k) if !k.is_empty() => Ok(k),
        _ => Err(ApiError::BadRequest("missing required query parameter: key".into())),
    }
}

async fn route(
    State(state): State<Arc<RouterState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<RouteResponse>, ApiError> {
    let key = require_key(&query)?;
    let shard = state.ring.pick(key);
    Ok(Json(RouteResponse {
        key: key.to_string(),
        shard: shard.to_string(),
    }))
}

/// Turns a reqwest response into an axum response, carrying the upstream
/// status code, its `Content-Type` (defaulting to `application/json` if the
/// shard omitted one, which it never should), and body through unchanged.
async fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();
    let body = upstream.bytes().await.unwrap_or_default();

    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, [(axum::http::header::CONTENT_TYPE, content_type)], body).into_response()
}

fn shard_error(err: reqwest::Error) -> ApiError {
    ApiError::Internal(format!("shard request failed: {err}"))
}

async fn proxy_get(
    State(state): State<Arc<RouterState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let key = require_key(&query)?;
    let shard = state.ring.pick(key);
    let resp = state
        .client
        .get(format!("{shard}/kv"))
        .query(&[("key", key)])
        .send()
        .await
        .map_err(shard_error)?;
    Ok(relay(resp).await)
}

/// Forwards the client's original `Content-Type` header verbatim rather
/// than hardcoding one: the router doesn't interpret the body, only the
/// shard that owns the key does.
async fn proxy_put(
    State(state): State<Arc<RouterState>>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = require_key(&query)?;
    let shard = state.ring.pick(key);

    let mut request = state.client.put(format!("{shard}/kv")).query(&[("key", key)]);
    if let Some(content_type) = headers.get(axum::http::header::CONTENT_TYPE) {
        request = request.header(axum::http::header::CONTENT_TYPE, content_type.clone());
    }
    let resp = request.body(body).send().await.map_err(shard_error)?;
    Ok(relay(resp).await)
}

async fn proxy_delete(
    State(state): State<Arc<RouterState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let key = require_key(&query)?;
    let shard = state.ring.pick(key);
    let resp = state
        .client
        .delete(format!("{shard}/kv"))
        .query(&[("key", key)])
        .send()
        .await
        .map_err(shard_error)?;
    Ok(relay(resp).await)
}
