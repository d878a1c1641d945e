//! Command Execution Module
//!
//! This module implements the execution layer of TTLKV.
//! It receives parsed commands from the worker pool, applies the per-key
//! locking discipline, executes them against the record store, and returns
//! the reply for the client.
//!
//! ## Architecture
//!
//! ```text
//! Worker dequeues request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lock         │
//! │  - Execute      │
//! │  - Release      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  RecordStore    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PUT key ttl value...`, `READ key`, `DELETE key`
//! - `DB_REQ_SIZE bytes` (control key, applied on restart)

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
