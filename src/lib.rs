mod api;
mod config;
mod engine;
mod error;
mod replication;
mod ring;
mod value;

pub use api::dto;
pub use api::{router_app, shard_app, RouterState, ShardState};
pub use config::{EngineConfig, RouterArgs, ShardArgs};
pub use engine::Engine;
pub use error::{ApiError, EngineError};
pub use replication::{ReplicaConfig, ReplicationOutcome, Replicator, WriteOp};
pub use ring::HashRing;
pub use value::{Record, Value};
