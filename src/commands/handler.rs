//! Command Handler Module
//!
//! This module executes queued commands against the record store and turns
//! the outcome into a [`Reply`].
//!
//! ## Locking
//!
//! PUT and DELETE hold the key's lock-table entry for the whole storage write.
//! If the key is already held (by another worker or by the garbage collector)
//! the command is abandoned with [`Reply::Locked`]; retrying is up to the
//! client. READ takes no lock: it is a single point lookup and storage batches
//! are atomic, so it sees either the old record or the new one.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ try_lock()  │───>│  execute()  │───>│ guard drop  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                            │                                │
//! │                            ▼                                │
//! │                       RecordStore                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Command, Reply};
use crate::storage::{LockTable, RecordStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Executes commands with the per-key locking discipline.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// Record-level storage
    store: RecordStore,
    /// Lock table shared with the garbage collector
    locks: Arc<LockTable>,
}

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new(store: RecordStore, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    /// Executes a command and returns the reply to send.
    pub fn execute(&self, command: &Command) -> Reply {
        match command {
            Command::Put {
                key,
                value,
                expires_at,
            } => self.with_lock(key, || {
                self.store
                    .put(key, value, *expires_at)
                    .map(|()| Reply::Done)
                    .unwrap_or_else(|e| {
                        error!(key = %String::from_utf8_lossy(key), error = %e, "PUT failed");
                        Reply::StorageFailure { command: "PUT" }
                    })
            }),
            Command::Delete { key } => self.with_lock(key, || {
                self.store
                    .delete(key)
                    .map(|()| Reply::Done)
                    .unwrap_or_else(|e| {
                        error!(key = %String::from_utf8_lossy(key), error = %e, "DELETE failed");
                        Reply::StorageFailure { command: "DELETE" }
                    })
            }),
            Command::Read { key } => self.read(key),
            Command::Control { name, value } => self.set_control(name, value),
        }
    }

    /// Runs `mutation` while holding the lock on `key`.
    ///
    /// The lock is released when the guard drops, whatever `mutation` returns.
    fn with_lock(&self, key: &Bytes, mutation: impl FnOnce() -> Reply) -> Reply {
        let Some(_guard) = self.locks.try_lock(key) else {
            warn!(key = %String::from_utf8_lossy(key), "Record is locked, request dropped");
            return Reply::Locked;
        };
        mutation()
    }

    fn read(&self, key: &Bytes) -> Reply {
        match self.store.get(key) {
            Ok(Some(value)) => Reply::Value {
                key: key.clone(),
                value,
            },
            Ok(None) => Reply::NotFound,
            Err(e) => {
                error!(key = %String::from_utf8_lossy(key), error = %e, "READ failed");
                Reply::StorageFailure { command: "READ" }
            }
        }
    }

    fn set_control(&self, name: &'static str, value: &Bytes) -> Reply {
        match self.store.set_control_value(name, value) {
            Ok(()) => {
                info!(
                    command = name,
                    value = %String::from_utf8_lossy(value),
                    "Control value updated, takes effect after restart"
                );
                Reply::ControlSet {
                    name,
                    value: value.clone(),
                }
            }
            Err(e) => {
                error!(command = name, error = %e, "Failed to update control value");
                Reply::StorageFailure { command: name }
            }
        }
    }
}
