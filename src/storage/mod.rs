//! Storage Module
//!
//! This module provides everything between a parsed command and the bytes on
//! disk: the ordered engine adapter, the key encoding, the per-key lock table,
//! record-level operations, and the background garbage collector.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       RecordStore                           │
//! │       PUT / DELETE / READ over the two key namespaces       │
//! │  ┌───────────────────────┐  ┌────────────────────────────┐  │
//! │  │ '0' key -> value      │  │ '1' deadline hash -> key   │  │
//! │  │ data namespace        │  │ expiration index           │  │
//! │  └───────────────────────┘  └────────────────────────────┘  │
//! │                 Storage (redb / in-memory)                  │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                                   ▲
//!            │ locked per key                    │ locked per key
//!   ┌────────┴────────┐                ┌─────────┴─────────┐
//!   │   Worker Pool   │ ── LockTable ──│ GarbageCollector  │
//!   └─────────────────┘                └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use ttlkv::storage::{MemoryStorage, RecordStore};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let store = RecordStore::new(Arc::new(MemoryStorage::new()));
//!
//! store.put(b"name", b"value", 4_000_000_000).unwrap();
//! assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("value")));
//! ```

pub mod engine;
pub mod gc;
pub mod keys;
pub mod locks;
pub mod store;

// Re-export commonly used types
pub use engine::{MemoryStorage, RedbStorage, Storage, StorageError, WriteBatch};
pub use gc::{collect_once, CollectStats, GarbageCollector, GcConfig};
pub use keys::KeyError;
pub use locks::{KeyGuard, LockTable};
pub use store::{ExpirationEntry, RecordStore, StoreError};
