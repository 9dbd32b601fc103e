use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShardHealth {
    pub status: &'static str,
    pub shard: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct RouterHealth {
    pub status: &'static str,
    pub shards: Vec<String>,
    pub vnodes: usize,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub shard: String,
    pub keys: usize,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub ok: bool,
    pub acks: usize,
    pub quorum: usize,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub key: String,
    pub shard: String,
}
