//! Connection Intake Module
//!
//! This module manages the client side of TTLKV. Every TCP connection
//! carries one request and gets one reply, after which the server closes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept(), spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Intake                               │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Parse cmd   │───>│ Enqueue     │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │         │                  │                  │             │
//! │         └── too large ─────┴── error ─────────┴── full ──>  │
//! │                        reply directly and close             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use ttlkv::connection::{handle_connection, ConnectionStats, Intake};
//! use ttlkv::server::RequestQueue;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let intake = Intake {
//!     queue: Arc::new(RequestQueue::new()),
//!     max_request_size: 256,
//!     request_timeout: Duration::from_secs(5),
//!     stats: Arc::new(ConnectionStats::new()),
//! };
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, intake.clone()));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionStats, Intake};
