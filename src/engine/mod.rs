mod snapshot;
mod wal;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::value::{now_millis, Record, Value};

struct State {
    table: HashMap<String, Record>,
    wal_buffer: Vec<u8>,
    wal: wal::WalWriter,
}

/// Durable key-value storage for one shard: an in-memory table backed by a
/// binary WAL and a periodic compressed snapshot.
///
/// Puts and deletes apply to the table and enqueue a WAL record
/// synchronously; they never wait on disk I/O. A background timer drains
/// the WAL buffer to disk and fsyncs it every `flush_interval_ms`. A
/// second timer snapshots the full table every `snapshot_interval_ms`. The
/// WAL is never truncated after a snapshot (see DESIGN.md) — recovery
/// replays the snapshot, then the whole WAL, and later records win.
pub struct Engine {
    state: Arc<Mutex<State>>,
    closed: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    snapshot_task: Mutex<Option<JoinHandle<()>>>,
    snapshot_path: PathBuf,
}

impl Engine {
    /// Opens (creating if absent) the engine's data directory, recovers
    /// from snapshot + WAL, and starts the background flush/snapshot
    /// timers. Must be called from within a Tokio runtime.
    pub fn open(data_dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let snapshot_path = data_dir.join(&config.snapshot_filename);
        let wal_path = data_dir.join(&config.wal_filename);

        let mut table = snapshot::read(&snapshot_path);
        wal::recover(&wal_path, |key, record| match record {
            Some(record) => {
                table.insert(key, record);
            }
            None => {
                table.remove(&key);
            }
        })?;

        let wal_writer = wal::WalWriter::open_append(&wal_path)?;
        let state = Arc::new(Mutex::new(State {
            table,
            wal_buffer: Vec::new(),
            wal: wal_writer,
        }));
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let flush_task = spawn_flush_timer(
            Arc::clone(&state),
            config.flush_interval_ms,
            shutdown_rx.clone(),
        );
        let snapshot_task = spawn_snapshot_timer(
            Arc::clone(&state),
            snapshot_path.clone(),
            config.snapshot_interval_ms,
            shutdown_rx,
        );

        Ok(Self {
            state,
            closed,
            shutdown_tx,
            flush_task: Mutex::new(Some(flush_task)),
            snapshot_task: Mutex::new(Some(snapshot_task)),
            snapshot_path,
        })
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.state.lock().table.get(key).cloned()
    }

    pub fn put(&self, key: &str, value: Value) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        let mut state = self.state.lock();
        let ts = now_millis();
        wal::encode_put(&mut state.wal_buffer, key, &value);
        state.table.insert(key.to_string(), Record { value, ts });
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        let mut state = self.state.lock();
        wal::encode_delete(&mut state.wal_buffer, key);
        state.table.remove(key);
        Ok(())
    }

    pub fn key_count(&self) -> usize {
        self.state.lock().table.len()
    }

    /// Forces an immediate snapshot, returning the keys captured in it. The
    /// background snapshot timer calls this same path on its own schedule.
    pub fn snapshot_now(&self) -> Result<Vec<String>, EngineError> {
        write_snapshot(&self.state, &self.snapshot_path)
    }

    /// Stops the background timers, drains and syncs the WAL buffer one
    /// final time, and marks the engine closed. Subsequent `put`/`delete`
    /// calls return `EngineError::Closed`. Safe to call on a shared handle
    /// (e.g. `Arc<Engine>`); idempotent past the first call.
    pub async fn close(&self) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        let flush_task = self.flush_task.lock().take();
        if let Some(task) = flush_task {
            let _ = task.await;
        }
        let snapshot_task = self.snapshot_task.lock().take();
        if let Some(task) = snapshot_task {
            let _ = task.await;
        }

        let mut state = self.state.lock();
        let buf = std::mem::take(&mut state.wal_buffer);
        state.wal.write_and_sync(&buf)
    }
}

fn spawn_flush_timer(
    state: Arc<Mutex<State>>,
    interval_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let buf = {
                        let mut guard = state.lock();
                        std::mem::take(&mut guard.wal_buffer)
                    };
                    if buf.is_empty() {
                        continue;
                    }
                    let result = {
                        let mut guard = state.lock();
                        guard.wal.write_and_sync(&buf)
                    };
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "WAL flush failed");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}

/// Writes the current table to `snapshot_path`, returning the sorted keys it
/// captured. Shared by `Engine::snapshot_now` and the background timer so
/// there is exactly one snapshot code path.
fn write_snapshot(state: &Mutex<State>, snapshot_path: &Path) -> Result<Vec<String>, EngineError> {
    let mut keys: Vec<String> = {
        let guard = state.lock();
        snapshot::write(snapshot_path, &guard.table)?;
        guard.table.keys().cloned().collect()
    };
    keys.sort();
    Ok(keys)
}

fn spawn_snapshot_timer(
    state: Arc<Mutex<State>>,
    snapshot_path: PathBuf,
    interval_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = write_snapshot(&state, &snapshot_path) {
                        tracing::warn!(error = %err, "snapshot write failed");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}
