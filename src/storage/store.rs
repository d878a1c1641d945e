//! Record Store
//!
//! Maps logical records onto the two namespaces of the ordered engine and keeps
//! them consistent. Every mutation of a record touches its data entry and its
//! expiration entry in one atomic batch, so a reader never sees one without the
//! other.
//!
//! ## Finding a record's expiration entry
//!
//! The expiration key embeds the deadline, which the data entry does not
//! record. Replacing or deleting a record therefore scans the expiration
//! namespace for the entry whose value (the back-pointer) equals the key. The
//! collector keeps that namespace limited to live records, but this scan is the
//! dominant cost of overwriting an existing key.
//!
//! None of these methods lock. Callers that mutate (the command handler and the
//! garbage collector) hold the key's [`LockTable`](super::LockTable) entry
//! around each call.

use crate::storage::engine::{Storage, StorageError, WriteBatch};
use crate::storage::keys::{self, KeyError, EXPIRATION_PREFIX};
use bytes::Bytes;
use std::ops::ControlFlow;
use std::sync::Arc;
use thiserror::Error;

/// Errors from record-level operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One entry of the expiration index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationEntry {
    /// The encoded expiration-namespace key
    pub index_key: Vec<u8>,
    /// The logical key the entry points back to
    pub key: Bytes,
    /// Deadline in unix seconds
    pub expires_at: u64,
}

/// Record-level view over an ordered storage engine.
#[derive(Clone)]
pub struct RecordStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl RecordStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Reads the current value of `key`.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        let value = self.storage.get(&keys::data_key(key))?;
        Ok(value.map(Bytes::from))
    }

    /// Stores `value` under `key`, expiring at unix second `expires_at`.
    ///
    /// An existing record's expiration entry is removed in the same batch, so
    /// the old deadline can never evict the new value.
    pub fn put(&self, key: &[u8], value: &[u8], expires_at: u64) -> StoreResult<()> {
        let new_index_key = keys::expiration_key(key, expires_at)?;
        let data_key = keys::data_key(key);

        let mut batch = WriteBatch::new();
        if self.storage.get(&data_key)?.is_some() {
            if let Some(old_index_key) = self.find_expiration_key(key)? {
                batch.delete(old_index_key);
            }
        }
        batch.put(data_key, value);
        batch.put(new_index_key, key);

        self.storage.write_batch(batch)?;
        Ok(())
    }

    /// Deletes `key` and its expiration entry. Missing entries are tolerated.
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(keys::data_key(key));
        if let Some(index_key) = self.find_expiration_key(key)? {
            batch.delete(index_key);
        }

        self.storage.write_batch(batch)?;
        Ok(())
    }

    /// Finds the expiration-namespace key whose back-pointer is `key`.
    pub fn find_expiration_key(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let mut found = None;
        self.storage.scan_prefix(&[EXPIRATION_PREFIX], &mut |index_key, back_pointer| {
            if back_pointer == key {
                found = Some(index_key.to_vec());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Collects expiration entries with a deadline at or before `now`,
    /// earliest first.
    ///
    /// The scan stops at the first entry that is still in the future: every
    /// later key has a later or equal deadline. At most `limit` entries are
    /// returned. Malformed index keys are skipped.
    pub fn expired_entries(&self, now: u64, limit: usize) -> StoreResult<Vec<ExpirationEntry>> {
        let mut due = Vec::new();
        self.storage.scan_prefix(&[EXPIRATION_PREFIX], &mut |index_key, back_pointer| {
            if due.len() >= limit {
                return ControlFlow::Break(());
            }
            match keys::decode_expiration(index_key) {
                Ok(expires_at) if expires_at <= now => {
                    due.push(ExpirationEntry {
                        index_key: index_key.to_vec(),
                        key: Bytes::copy_from_slice(back_pointer),
                        expires_at,
                    });
                    ControlFlow::Continue(())
                }
                Ok(_) => ControlFlow::Break(()),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed expiration index entry");
                    ControlFlow::Continue(())
                }
            }
        })?;
        Ok(due)
    }

    /// Removes the record an expiration entry points to.
    ///
    /// Returns `false` without writing if the entry is gone or now points at a
    /// different key, which happens when a PUT or DELETE replaced it after the
    /// collector's scan.
    pub fn evict(&self, entry: &ExpirationEntry) -> StoreResult<bool> {
        match self.storage.get(&entry.index_key)? {
            Some(back_pointer) if back_pointer == entry.key.as_ref() => {}
            _ => return Ok(false),
        }

        let mut batch = WriteBatch::new();
        batch.delete(entry.index_key.clone());
        batch.delete(keys::data_key(&entry.key));
        self.storage.write_batch(batch)?;
        Ok(true)
    }

    /// Reads a bare control key.
    pub fn control_value(&self, name: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.storage.get(name.as_bytes())?.map(Bytes::from))
    }

    /// Writes a bare control key. Control keys have no expiration entry.
    pub fn set_control_value(&self, name: &str, value: &[u8]) -> StoreResult<()> {
        self.storage.put(name.as_bytes(), value)?;
        Ok(())
    }

    /// Number of entries in the expiration index.
    pub fn expiration_count(&self) -> StoreResult<usize> {
        let mut count = 0;
        self.storage.scan_prefix(&[EXPIRATION_PREFIX], &mut |_, _| {
            count += 1;
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::{MemoryStorage, RedbStorage};
    use crate::storage::keys::DATA_PREFIX;
    use tempfile::TempDir;

    fn memory_store() -> (Arc<MemoryStorage>, RecordStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = RecordStore::new(storage.clone());
        (storage, store)
    }

    /// Every data entry has exactly one expiration entry pointing back at it.
    fn assert_namespaces_consistent(storage: &dyn Storage) {
        let mut data_keys = Vec::new();
        storage
            .scan_prefix(&[DATA_PREFIX], &mut |k, _| {
                data_keys.push(k[1..].to_vec());
                ControlFlow::Continue(())
            })
            .unwrap();

        let mut back_pointers = Vec::new();
        storage
            .scan_prefix(&[EXPIRATION_PREFIX], &mut |_, v| {
                back_pointers.push(v.to_vec());
                ControlFlow::Continue(())
            })
            .unwrap();

        data_keys.sort();
        back_pointers.sort();
        assert_eq!(data_keys, back_pointers);
    }

    #[test]
    fn test_put_and_get() {
        let (storage, store) = memory_store();

        store.put(b"alpha", b"hello", 1_000).unwrap();

        assert_eq!(store.get(b"alpha").unwrap(), Some(Bytes::from("hello")));
        assert_eq!(store.get(b"missing").unwrap(), None);
        assert_eq!(storage.len(), 2);
        assert_namespaces_consistent(storage.as_ref());
    }

    #[test]
    fn test_overwrite_replaces_expiration_entry() {
        let (storage, store) = memory_store();

        store.put(b"k", b"v1", 100).unwrap();
        store.put(b"k", b"v2", 200).unwrap();

        assert_eq!(store.get(b"k").unwrap(), Some(Bytes::from("v2")));
        assert_eq!(store.expiration_count().unwrap(), 1);
        assert_namespaces_consistent(storage.as_ref());

        // The old deadline has passed, the new one has not
        assert!(store.expired_entries(150, usize::MAX).unwrap().is_empty());
        assert_eq!(store.expired_entries(200, usize::MAX).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_both_entries() {
        let (storage, store) = memory_store();

        store.put(b"k", b"v", 100).unwrap();
        store.put(b"other", b"v", 100).unwrap();
        store.delete(b"k").unwrap();

        assert_eq!(store.get(b"k").unwrap(), None);
        assert_eq!(store.get(b"other").unwrap(), Some(Bytes::from("v")));
        assert_eq!(storage.len(), 2);
        assert_namespaces_consistent(storage.as_ref());
    }

    #[test]
    fn test_delete_missing_is_idempotent() {
        let (storage, store) = memory_store();

        store.put(b"keep", b"v", 100).unwrap();
        store.delete(b"nothing").unwrap();
        store.delete(b"nothing").unwrap();

        assert_eq!(store.get(b"keep").unwrap(), Some(Bytes::from("v")));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_expired_entries_stop_at_future_deadline() {
        let (_, store) = memory_store();

        store.put(b"c", b"v", 30).unwrap();
        store.put(b"a", b"v", 10).unwrap();
        store.put(b"b", b"v", 20).unwrap();
        store.put(b"d", b"v", 40).unwrap();

        let due = store.expired_entries(25, usize::MAX).unwrap();
        let keys: Vec<&[u8]> = due.iter().map(|e| e.key.as_ref()).collect();
        assert_eq!(keys, vec![&b"a"[..], b"b"]);
        assert_eq!(due[0].expires_at, 10);

        // Deadline equal to now is due
        assert_eq!(store.expired_entries(30, usize::MAX).unwrap().len(), 3);

        // Limit caps the batch
        assert_eq!(store.expired_entries(100, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_evict_removes_record() {
        let (storage, store) = memory_store();

        store.put(b"k", b"v", 10).unwrap();
        let due = store.expired_entries(10, usize::MAX).unwrap();
        assert!(store.evict(&due[0]).unwrap());

        assert_eq!(store.get(b"k").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_evict_skips_superseded_entry() {
        let (_, store) = memory_store();

        store.put(b"k", b"v1", 10).unwrap();
        let stale = store.expired_entries(10, usize::MAX).unwrap().remove(0);

        // A PUT lands between the collector's scan and its eviction
        store.put(b"k", b"v2", 500).unwrap();

        assert!(!store.evict(&stale).unwrap());
        assert_eq!(store.get(b"k").unwrap(), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_put_rejects_unencodable_deadline() {
        let (storage, store) = memory_store();

        let err = store.put(b"k", b"v", keys::MAX_TIMESTAMP + 1).unwrap_err();
        assert!(matches!(err, StoreError::Key(KeyError::TimestampOverflow(_))));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_control_values_are_bare_keys() {
        let (storage, store) = memory_store();

        assert_eq!(store.control_value("DB_REQ_SIZE").unwrap(), None);
        store.set_control_value("DB_REQ_SIZE", b"512").unwrap();

        assert_eq!(storage.get(b"DB_REQ_SIZE").unwrap(), Some(b"512".to_vec()));
        assert_eq!(store.expiration_count().unwrap(), 0);
    }

    #[test]
    fn test_redb_backed_store() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RedbStorage::open(dir.path().join("db.redb")).unwrap());
        let store = RecordStore::new(storage.clone());

        store.put(b"beta", b"world", 60).unwrap();
        store.put(b"beta", b"again", 90).unwrap();
        assert_eq!(store.get(b"beta").unwrap(), Some(Bytes::from("again")));
        assert_namespaces_consistent(storage.as_ref());

        store.delete(b"beta").unwrap();
        assert_eq!(store.get(b"beta").unwrap(), None);
        assert_eq!(store.expiration_count().unwrap(), 0);
    }
}
