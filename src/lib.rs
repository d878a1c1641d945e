//! # TTLKV - A Persistent Key-Value Server with Per-Key Expiration
//!
//! TTLKV is a small network key-value store written in Rust. Every record is
//! written with a time-to-live; a background collector removes records once
//! their deadline passes.
//!
//! ## Features
//!
//! - **Simple Text Protocol**: One request per TCP connection, one reply back
//! - **Persistent**: Records live in an ordered on-disk store (redb)
//! - **TTL Everywhere**: Every `PUT` carries an expiration in seconds
//! - **Worker Pool**: A fixed number of Tokio tasks execute queued requests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               TTLKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐                 │
//! │  │ TCP Server  │───>│   Intake    │───>│ RequestQueue │                 │
//! │  │ (Listener)  │    │ read, parse │    │    (FIFO)    │                 │
//! │  └─────────────┘    └─────────────┘    └──────┬───────┘                 │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐                 │
//! │  │  LockTable  │<───│  Command    │<───│  WorkerPool  │                 │
//! │  │ (per key)   │    │  Handler    │    │  (N tasks)   │                 │
//! │  └──────┬──────┘    └──────┬──────┘    └──────────────┘                 │
//! │         │                  ▼                                            │
//! │         │   ┌────────────────────────────────────────────┐             │
//! │         │   │                RecordStore                 │             │
//! │         │   │  '0' data namespace │ '1' expiration index │             │
//! │         │   └────────────────────────────────────────────┘             │
//! │         │                  ▲                                            │
//! │         │   ┌──────────────┴─────────────────────────────┐             │
//! │         └──>│            GarbageCollector                │             │
//! │             │          (Background Tokio Task)           │             │
//! │             └────────────────────────────────────────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ttlkv::config::ServerConfig;
//! use ttlkv::server::Server;
//! use ttlkv::storage::RedbStorage;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let storage = Arc::new(RedbStorage::open(&config.db_path)?);
//!     let listener = TcpListener::bind(config.bind_address()).await?;
//!
//!     let server = Server::new(config, storage)?;
//!     server.run(listener, async { let _ = tokio::signal::ctrl_c().await; }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PUT key ttl_seconds value...`
//! - `READ key`
//! - `DELETE key`
//! - `DB_REQ_SIZE bytes` (persisted, applied on the next start)
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request parser and reply types
//! - [`storage`]: Engine adapter, key encoding, locks, record store, collector
//! - [`commands`]: Executes commands under the per-key locking rules
//! - [`connection`]: Per-connection intake
//! - [`server`]: Request queue, worker pool and accept loop
//! - [`config`]: Defaults, control keys and server configuration
//!
//! ## Design Highlights
//!
//! ### Two Namespaces, One Keyspace
//!
//! Data entries live under prefix `0`, expiration entries under prefix `1`
//! followed by a fixed-width deadline. Because the engine is ordered, a
//! prefix scan of `1` walks deadlines oldest first, so the collector can
//! stop at the first deadline still in the future.
//!
//! ### Non-Blocking Locks
//!
//! A mutation that finds its key locked is abandoned with a reply, never
//! queued behind the holder. The collector skips locked keys and retries
//! them on its next cycle.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::{handle_connection, ConnectionStats, Intake};
pub use protocol::{parse_command, Command, ParseError, Reply};
pub use server::{RequestQueue, Server, WorkerPool};
pub use storage::{GarbageCollector, GcConfig, LockTable, RecordStore, RedbStorage, Storage};

/// Version of TTLKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
