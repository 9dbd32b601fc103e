use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::dto::{GetResponse, KeyQuery, ShardHealth, Stats, WriteResponse};
use crate::error::ApiError;
use crate::replication::{Replicator, WriteOp, FORWARDED_BY_HEADER};
use crate::value::Value;
use crate::Engine;

/// Shared state for one shard process: its engine and its replicator.
pub struct ShardState {
    pub engine: Engine,
    pub replicator: Replicator,
    pub shard_id: String,
    pub port: u16,
}

pub fn shard_app(state: Arc<ShardState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route(
            "/kv",
            get(get_kv).put(put_kv).delete(delete_kv),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<ShardState>>) -> Json<ShardHealth> {
    Json(ShardHealth {
        status: "ok",
        shard: state.shard_id.clone(),
        port: state.port,
    })
}

async fn stats(State(state): State<Arc<ShardState>>) -> Json<Stats> {
    Json(Stats {
        shard: state.shard_id.clone(),
        keys: state.engine.key_count(),
    })
}

fn require_key(query: &KeyQuery) -> Result<&str, ApiError> {
    match &query.key {
        Some(k) if !k.is_empty() => Ok(k),
        _ => Err(ApiError::BadRequest("missing required query parameter: key".into())),
    }
}

async fn get_kv(
    State(state): State<Arc<ShardState>>,
    Query(query): Query<KeyQuery>,
) -> Result<(StatusCode, Json<GetResponse>), ApiError> {
    let key = require_key(&query)?;
    match state.engine.get(key) {
        Some(record) => Ok((
            StatusCode::OK,
            Json(GetResponse {
                found: true,
                value: Some(record.value.as_json()),
                ts: Some(record.ts),
            }),
        )),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(GetResponse {
                found: false,
                value: None,
                ts: None,
            }),
        )),
    }
}

/// True iff the request carries the replication marker identifying the
/// shard that forwarded it — such requests are applied locally only and
/// never re-replicated.
fn is_forwarded(headers: &HeaderMap) -> bool {
    headers.contains_key(FORWARDED_BY_HEADER)
}

fn parse_put_value(headers: &HeaderMap, body: &Bytes) -> Result<Value, ApiError> {
    let is_json = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let parsed: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
        Ok(Value::from_parsed_json(parsed))
    } else {
        let s = std::str::from_utf8(body)
            .map_err(|e| ApiError::BadRequest(format!("body is not valid UTF-8: {e}")))?;
        Ok(Value::Bytes(s.to_string()))
    }
}

async fn put_kv(
    State(state): State<Arc<ShardState>>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let key = require_key(&query)?;
    let value = parse_put_value(&headers, &body)?;

    state.engine.put(key, value.clone())?;

    if is_forwarded(&headers) {
        return Ok(Json(WriteResponse { ok: true, acks: 1, quorum: 1 }));
    }

    let outcome = state
        .replicator
        .replicate(&WriteOp::Put { key: key.to_string(), value })
        .await;
    Ok(Json(WriteResponse {
        ok: outcome.ok,
        acks: outcome.acks,
        quorum: outcome.quorum,
    }))
}

async fn delete_kv(
    State(state): State<Arc<ShardState>>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Json<WriteResponse>, ApiError> {
    let key = require_key(&query)?;
    state.engine.delete(key)?;

    if is_forwarded(&headers) {
        return Ok(Json(WriteResponse { ok: true, acks: 1, quorum: 1 }));
    }

    let outcome = state
        .replicator
        .replicate(&WriteOp::Delete { key: key.to_string() })
        .await;
    Ok(Json(WriteResponse {
        ok: outcome.ok,
        acks: outcome.acks,
        quorum: outcome.quorum,
    }))
}

