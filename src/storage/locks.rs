//! Per-Key Lock Table
//!
//! The lock table is the only thing that keeps two mutations of the same key
//! (a PUT, a DELETE, or a garbage-collector eviction) from interleaving their
//! storage writes. It is advisory: every mutating path must go through it.
//!
//! Acquisition never blocks. A caller that finds the key already locked gets a
//! conflict back and decides for itself whether to retry; workers report it to
//! the client, the collector tries again next cycle.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of keys currently being mutated.
///
/// One table is constructed at startup and shared (via `Arc`) between the
/// worker pool and the garbage collector.
#[derive(Debug, Default)]
pub struct LockTable {
    locked: Mutex<HashSet<Bytes>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as locked.
    ///
    /// Returns `false` without waiting if the key is already locked.
    pub fn acquire(&self, key: &[u8]) -> bool {
        let mut locked = self.locked.lock();
        if locked.contains(key) {
            return false;
        }
        locked.insert(Bytes::copy_from_slice(key));
        true
    }

    /// Unlocks `key`. Does nothing if it was not locked.
    pub fn release(&self, key: &[u8]) {
        self.locked.lock().remove(key);
    }

    /// Number of keys currently locked.
    pub fn len(&self) -> usize {
        self.locked.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked.lock().is_empty()
    }

    /// Acquires `key` and returns a guard that releases it when dropped.
    ///
    /// The guard makes the release unconditional: it runs on success, on a
    /// storage error, and on an early return alike.
    pub fn try_lock(self: &Arc<Self>, key: &[u8]) -> Option<KeyGuard> {
        if self.acquire(key) {
            Some(KeyGuard {
                table: Arc::clone(self),
                key: Bytes::copy_from_slice(key),
            })
        } else {
            None
        }
    }
}

/// Holds a key locked for as long as it lives.
#[derive(Debug)]
pub struct KeyGuard {
    table: Arc<LockTable>,
    key: Bytes,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}
