pub mod dto;
mod router;
mod shard;

pub use router::{router_app, RouterState};
pub use shard::{shard_app, ShardState};
