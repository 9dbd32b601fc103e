use clap::Parser;

/// Tunables for one shard's storage engine.
///
/// # Example
/// ```
/// use shardkv::EngineConfig;
///
/// let config = EngineConfig::new().flush_interval_ms(5);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wal_filename: String,
    pub snapshot_filename: String,
    pub snapshot_interval_ms: u64,
    pub flush_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wal_filename: "wal.log".to_string(),
            snapshot_filename: "snapshot.json.gz".to_string(),
            snapshot_interval_ms: 10_000,
            flush_interval_ms: 2,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wal_filename(mut self, name: impl Into<String>) -> Self {
        self.wal_filename = name.into();
        self
    }

    pub fn snapshot_filename(mut self, name: impl Into<String>) -> Self {
        self.snapshot_filename = name.into();
        self
    }

    pub fn snapshot_interval_ms(mut self, ms: u64) -> Self {
        self.snapshot_interval_ms = ms;
        self
    }

    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }
}

/// CLI arguments for the `shard` binary.
#[derive(Debug, Parser)]
#[command(name = "shard", about = "One storage node owning a partition of the keyspace")]
pub struct ShardArgs {
    #[arg(long, default_value_t = 7000)]
    pub port: u16,

    #[arg(long, default_value = "data")]
    pub data: String,

    /// Comma-separated peer base URLs this shard replicates writes to.
    #[arg(long, default_value = "")]
    pub replicas: String,

    #[arg(long, default_value_t = 1)]
    pub quorum: usize,

    #[arg(long, default_value = "shard")]
    pub id: String,

    #[arg(long, default_value = "wal.log")]
    pub wal_filename: String,

    #[arg(long, default_value = "snapshot.json.gz")]
    pub snapshot_filename: String,

    #[arg(long, default_value_t = 10_000)]
    pub snapshot_interval_ms: u64,

    #[arg(long, default_value_t = 2)]
    pub flush_interval_ms: u64,
}

impl ShardArgs {
    pub fn replica_urls(&self) -> Vec<String> {
        self.replicas
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .wal_filename(self.wal_filename.clone())
            .snapshot_filename(self.snapshot_filename.clone())
            .snapshot_interval_ms(self.snapshot_interval_ms)
            .flush_interval_ms(self.flush_interval_ms)
    }
}

/// CLI arguments for the `router` binary.
#[derive(Debug, Parser)]
#[command(name = "router", about = "Stateless request router over a shard ring")]
pub struct RouterArgs {
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Comma-separated shard base URLs, e.g. http://127.0.0.1:7000.
    #[arg(long)]
    pub shards: String,

    #[arg(long, default_value_t = 100)]
    pub vnodes: usize,
}

impl RouterArgs {
    pub fn shard_urls(&self) -> Vec<String> {
        self.shards
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
