//! Background Garbage Collector
//!
//! This module implements the task that reclaims expired records. Nothing else
//! removes a record once its TTL has passed; reads do a plain point lookup.
//!
//! ## Design
//!
//! The collector runs as a single Tokio task and, every cycle:
//! 1. Walks the expiration index in ascending key order, which is ascending
//!    deadline order
//! 2. Collects entries whose deadline is at or before the current second, at
//!    most `batch_limit` at a time
//! 3. Evicts each collected record under its key lock, then rescans for the
//!    next chunk
//! 4. Stops at the first entry still in the future; everything after it is later
//! 5. Sleeps for a fixed interval (default: 100ms)
//!
//! ## Failures
//!
//! A lock conflict with an in-flight PUT/DELETE, or a storage error, only
//! defers the eviction: the expiration entry stays in the index and the next
//! cycle sees it again. Nothing here is ever surfaced to a client.

use crate::storage::keys::unix_now;
use crate::storage::locks::LockTable;
use crate::storage::store::RecordStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Configuration for the garbage collector.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Pause between scan cycles (default: 100ms)
    pub interval: Duration,

    /// Due entries read from the index per scan chunk (default: 1024)
    pub batch_limit: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            batch_limit: 1024,
        }
    }
}

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Records removed
    pub evicted: u64,
    /// Records left for the next cycle (lock conflict or storage error)
    pub deferred: u64,
}

/// Runs one collection cycle against the given clock value.
///
/// Due entries are read in chunks of `limit` so one cycle never holds more
/// than that many in memory. The cycle keeps scanning until the first
/// deadline after `now`, or until a chunk makes no progress because every
/// entry in it is locked or failed.
pub fn collect_once(
    store: &RecordStore,
    locks: &Arc<LockTable>,
    now: u64,
    limit: usize,
) -> CollectStats {
    let mut stats = CollectStats::default();
    let limit = limit.max(1);
    // Entries left in the index this cycle; a rescan returns them again
    let mut deferred: HashSet<Vec<u8>> = HashSet::new();

    loop {
        let due = match store.expired_entries(now, limit) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to scan expiration index");
                return stats;
            }
        };

        let last_chunk = due.len() < limit;
        let mut removed = 0usize;

        for entry in due {
            if deferred.contains(&entry.index_key) {
                continue;
            }

            let Some(_guard) = locks.try_lock(&entry.key) else {
                warn!(
                    key = %String::from_utf8_lossy(&entry.key),
                    "Record is locked, eviction deferred to next cycle"
                );
                stats.deferred += 1;
                deferred.insert(entry.index_key);
                continue;
            };

            match store.evict(&entry) {
                Ok(true) => {
                    debug!(
                        key = %String::from_utf8_lossy(&entry.key),
                        expires_at = entry.expires_at,
                        "Record expired and garbage collected"
                    );
                    stats.evicted += 1;
                    removed += 1;
                }
                // Superseded by a PUT or DELETE since the scan
                Ok(false) => removed += 1,
                Err(e) => {
                    error!(
                        key = %String::from_utf8_lossy(&entry.key),
                        error = %e,
                        "Failed to evict expired record"
                    );
                    stats.deferred += 1;
                    deferred.insert(entry.index_key);
                }
            }
        }

        if last_chunk || removed == 0 {
            return stats;
        }
    }
}

/// A handle to the running garbage collector.
///
/// When this handle is dropped, the collector task will be stopped.
#[derive(Debug)]
pub struct GarbageCollector {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl GarbageCollector {
    /// Starts the garbage collector as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ttlkv::storage::{GarbageCollector, GcConfig, LockTable, MemoryStorage, RecordStore};
    /// use std::sync::Arc;
    ///
    /// let store = RecordStore::new(Arc::new(MemoryStorage::new()));
    /// let locks = Arc::new(LockTable::new());
    /// let gc = GarbageCollector::start(store, locks, GcConfig::default());
    ///
    /// // Collector runs in the background...
    ///
    /// drop(gc);
    /// ```
    pub fn start(store: RecordStore, locks: Arc<LockTable>, config: GcConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(collector_loop(store, locks, config, shutdown_rx));

        info!("Garbage collector started");

        Self { shutdown_tx }
    }

    /// Stops the garbage collector.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        self.stop();
        info!("Garbage collector stopped");
    }
}

/// The main collector loop.
async fn collector_loop(
    store: RecordStore,
    locks: Arc<LockTable>,
    config: GcConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let stats = collect_once(&store, &locks, unix_now(), config.batch_limit);

        if stats.evicted > 0 || stats.deferred > 0 {
            info!(
                evicted = stats.evicted,
                deferred = stats.deferred,
                "Garbage collection cycle finished"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Garbage collector received shutdown signal");
                    return;
                }
            }
        }
    }
}
