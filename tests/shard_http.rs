//! End-to-end tests against a real shard process bound to an ephemeral
//! port, driven with a plain reqwest client.

use std::sync::Arc;

use serde_json::json;
use shardkv::{shard_app, Engine, EngineConfig, ReplicaConfig, Replicator, ShardState};
use tempfile::tempdir;

async fn spawn_shard(quorum: usize, replicas: Vec<String>) -> String {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), EngineConfig::new().flush_interval_ms(5)).unwrap();

    let replicator = Replicator::new(ReplicaConfig {
        replicas,
        quorum,
        shard_id: "test-shard".to_string(),
    });

    let state = Arc::new(ShardState {
        engine,
        replicator,
        shard_id: "test-shard".to_string(),
        port: 0,
    });
    let app = shard_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    format!("http://{addr}")
}

#[tokio::test]
async fn health_and_stats_report_shard_identity() {
    let base = spawn_shard(1, vec![]).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["shard"], "test-shard");

    let stats: serde_json::Value = client
        .get(format!("{base}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["keys"], 0);
}

#[tokio::test]
async fn put_get_delete_round_trip_for_string_value() {
    let base = spawn_shard(1, vec![]).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/kv"))
        .query(&[("key", "greeting")])
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let write: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(write["ok"], true);
    assert_eq!(write["acks"], 1);

    let got: serde_json::Value = client
        .get(format!("{base}/kv"))
        .query(&[("key", "greeting")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(got["found"], true);
    assert_eq!(got["value"], "hello");

    let del_status = client
        .delete(format!("{base}/kv"))
        .query(&[("key", "greeting")])
        .send()
        .await
        .unwrap()
        .status();
    assert!(del_status.is_success());

    let after_delete = client
        .get(format!("{base}/kv"))
        .query(&[("key", "greeting")])
        .send()
        .await
        .unwrap();
    assert_eq!(after_delete.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_structured_json_round_trips_as_an_object() {
    let base = spawn_shard(1, vec![]).await;
    let client = reqwest::Client::new();

    let doc = json!({"name": "Ada", "tags": ["math", "engines"]});
    client
        .put(format!("{base}/kv"))
        .query(&[("key", "user:1")])
        .json(&doc)
        .send()
        .await
        .unwrap();

    let got: serde_json::Value = client
        .get(format!("{base}/kv"))
        .query(&[("key", "user:1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(got["value"], doc);
}

#[tokio::test]
async fn get_without_key_query_param_is_bad_request() {
    let base = spawn_shard(1, vec![]).await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{base}/kv")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn put_get_round_trips_10kib_and_1mib_values() {
    let base = spawn_shard(1, vec![]).await;
    let client = reqwest::Client::new();

    for (key, size) in [("medium", 10 * 1024usize), ("large", 1024 * 1024)] {
        let value = "x".repeat(size);
        let resp = client
            .put(format!("{base}/kv"))
            .query(&[("key", key)])
            .header("content-type", "text/plain")
            .body(value.clone())
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());

        let got: serde_json::Value = client
            .get(format!("{base}/kv"))
            .query(&[("key", key)])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(got["value"].as_str().unwrap().len(), size);
        assert_eq!(got["value"], value);
    }
}

#[tokio::test]
async fn forwarded_write_is_not_re_replicated_and_reports_single_ack() {
    let base = spawn_shard(3, vec!["http://127.0.0.1:1".to_string()]).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/kv"))
        .query(&[("key", "k")])
        .header("x-forwarded-by", "other-shard")
        .header("content-type", "text/plain")
        .body("v")
        .send()
        .await
        .unwrap();
    let write: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(write["ok"], true);
    assert_eq!(write["acks"], 1);
    assert_eq!(write["quorum"], 1);
}

#[tokio::test]
async fn unreachable_replica_fails_to_meet_quorum() {
    let base = spawn_shard(3, vec!["http://127.0.0.1:1".to_string()]).await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{base}/kv"))
        .query(&[("key", "k")])
        .header("content-type", "text/plain")
        .body("v")
        .send()
        .await
        .unwrap();
    let write: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(write["ok"], false);
    assert_eq!(write["quorum"], 3);
}
