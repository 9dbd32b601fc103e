use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use shardkv::{router_app, HashRing, RouterArgs, RouterState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = RouterArgs::parse();
    let shards = args.shard_urls();
    if shards.is_empty() {
        return Err("router needs at least one --shards entry".into());
    }
    let ring = HashRing::build(&shards, args.vnodes);

    let state = Arc::new(RouterState {
        ring,
        vnodes: args.vnodes,
        client: reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?,
    });

    let app = router_app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(port = args.port, shards = shards.len(), "router listening");
    axum::serve(listener, app).await?;
    Ok(())
}
