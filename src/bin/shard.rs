use std::sync::Arc;

use clap::Parser;
use shardkv::{shard_app, Engine, ReplicaConfig, Replicator, ShardArgs, ShardState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ShardArgs::parse();
    let engine = Engine::open(&args.data, args.engine_config())?;
    let replicator = Replicator::new(ReplicaConfig {
        replicas: args.replica_urls(),
        quorum: args.quorum,
        shard_id: args.id.clone(),
    });

    let state = Arc::new(ShardState {
        engine,
        replicator,
        shard_id: args.id.clone(),
        port: args.port,
    });

    let app = shard_app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(shard = %args.id, port = args.port, "shard listening");
    axum::serve(listener, app).await?;
    Ok(())
}
