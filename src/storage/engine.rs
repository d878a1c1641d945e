//! Ordered Storage Engine Adapter
//!
//! This module defines the contract TTLKV needs from the underlying ordered
//! key-value engine, plus two implementations of it.
//!
//! ## Contract
//!
//! - Point `get` / `put` / `delete` by raw byte key
//! - Atomic batches: every write in a [`WriteBatch`] becomes visible, or none does
//! - Prefix scans in ascending byte order, stoppable at any entry
//!
//! ## Implementations
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │       RedbStorage        │     │      MemoryStorage       │
//! │  single redb table       │     │  BTreeMap behind RwLock  │
//! │  batch = write txn       │     │  batch = one write lock  │
//! │  (persistent, default)   │     │  (tests, benches)        │
//! └──────────────────────────┘     └──────────────────────────┘
//! ```
//!
//! Scans hold a read snapshot (or read lock) for their whole duration, so the
//! visitor must not write back into the store. Callers collect what they need
//! and write after the scan returns.

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::Path;
use thiserror::Error;

/// The single table holding all three key namespaces.
const KV_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ttlkv");

/// Errors reported by a storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failure inside the redb engine (I/O, corruption, transaction)
    #[error("storage engine error: {0}")]
    Engine(#[from] redb::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Converts any of redb's specific error types into a [`StorageError`].
fn engine_err<E: Into<redb::Error>>(err: E) -> StorageError {
    StorageError::Engine(err.into())
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// A group of writes applied atomically by [`Storage::write_batch`].
///
/// Operations are applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an insert or overwrite.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queues a delete. Deleting a missing key is not an error.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Visitor called for each entry of a prefix scan.
///
/// Return `ControlFlow::Break(())` to stop the scan early.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> ControlFlow<()> + 'a;

/// The ordered key-value engine contract.
///
/// Implementations must be safe to share across tasks; all application-level
/// mutual exclusion is done by the lock table, not here.
pub trait Storage: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Inserts or overwrites a single key.
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removes a single key. Missing keys are tolerated.
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Applies every operation of `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Visits every entry whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8], visit: &mut ScanVisitor<'_>) -> StorageResult<()>;
}

/// Persistent storage backed by a redb database file.
pub struct RedbStorage {
    db: Database,
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage").finish_non_exhaustive()
    }
}

impl RedbStorage {
    /// Opens (or creates) the database at `path` and makes sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path.as_ref()).map_err(engine_err)?;

        // Read transactions fail on tables that were never created
        let tx = db.begin_write().map_err(engine_err)?;
        tx.open_table(KV_TABLE).map_err(engine_err)?;
        tx.commit().map_err(engine_err)?;

        Ok(Self { db })
    }
}

impl Storage for RedbStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read().map_err(engine_err)?;
        let table = tx.open_table(KV_TABLE).map_err(engine_err)?;
        let value = table
            .get(key)
            .map_err(engine_err)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(batch)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write_batch(batch)
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let tx = self.db.begin_write().map_err(engine_err)?;
        {
            let mut table = tx.open_table(KV_TABLE).map_err(engine_err)?;
            for op in batch.ops {
                match op {
                    BatchOp::Put { key, value } => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(engine_err)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_slice()).map_err(engine_err)?;
                    }
                }
            }
        }
        // Dropping an uncommitted transaction aborts it, so an early return
        // above leaves nothing behind.
        tx.commit().map_err(engine_err)
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut ScanVisitor<'_>) -> StorageResult<()> {
        let tx = self.db.begin_read().map_err(engine_err)?;
        let table = tx.open_table(KV_TABLE).map_err(engine_err)?;

        for item in table.range(prefix..).map_err(engine_err)? {
            let (key, value) = item.map_err(engine_err)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if visit(key, value.value()).is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// Non-persistent storage for tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw entries across all namespaces.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut data = self.data.write();
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8], visit: &mut ScanVisitor<'_>) -> StorageResult<()> {
        let data = self.data.read();
        for (key, value) in data.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if visit(key.as_slice(), value.as_slice()).is_break() {
                break;
            }
        }
        Ok(())
    }
}
