//! Server Module
//!
//! Wires the request queue, the worker pool, the garbage collector and the
//! accept loop together around one record store and one lock table.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  spawn per conn  ┌──────────┐  enqueue  ┌──────────────┐
//! │ Listener  │─────────────────>│  Intake  │──────────>│ RequestQueue │
//! └───────────┘                  └──────────┘           └──────┬───────┘
//!                                                              │ dequeue
//!                                                              ▼
//!                    ┌──────────────────┐  LockTable   ┌──────────────┐
//!                    │ GarbageCollector │<────────────>│  WorkerPool  │
//!                    └────────┬─────────┘              └──────┬───────┘
//!                             └───────────> RecordStore <─────┘
//! ```

pub mod queue;
pub mod worker;

pub use queue::{QueueError, QueuedRequest, ReplySink, RequestQueue};
pub use worker::WorkerPool;

use crate::commands::CommandHandler;
use crate::config::{load_max_request_size, ServerConfig};
use crate::connection::{handle_connection, ConnectionStats, Intake};
use crate::storage::{GarbageCollector, GcConfig, LockTable, RecordStore, Storage, StoreError};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// A configured server, ready to accept connections.
pub struct Server {
    config: ServerConfig,
    store: RecordStore,
    locks: Arc<LockTable>,
    queue: Arc<RequestQueue>,
    stats: Arc<ConnectionStats>,
    max_request_size: usize,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("max_request_size", &self.max_request_size)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Builds a server over `storage`, reading the persisted max request size.
    pub fn new(config: ServerConfig, storage: Arc<dyn Storage>) -> Result<Self, StoreError> {
        let store = RecordStore::new(storage);
        let max_request_size = load_max_request_size(&store)?;

        Ok(Self {
            queue: Arc::new(RequestQueue::with_capacity(config.max_queue_len)),
            config,
            store,
            locks: Arc::new(LockTable::new()),
            stats: Arc::new(ConnectionStats::new()),
            max_request_size,
        })
    }

    /// Intake statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Largest request the server will read, in bytes.
    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    /// Starts the workers and the collector, then accepts connections until
    /// `shutdown` completes.
    pub async fn run(self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        let handler = CommandHandler::new(self.store.clone(), Arc::clone(&self.locks));
        let workers = WorkerPool::start(
            self.config.workers,
            Arc::clone(&self.queue),
            handler,
            self.config.worker_idle,
        );

        let gc = GarbageCollector::start(
            self.store.clone(),
            Arc::clone(&self.locks),
            GcConfig {
                interval: self.config.gc_interval,
                ..Default::default()
            },
        );

        let intake = Intake {
            queue: Arc::clone(&self.queue),
            max_request_size: self.max_request_size,
            request_timeout: self.config.request_timeout,
            stats: Arc::clone(&self.stats),
        };

        tokio::select! {
            _ = accept_loop(listener, intake) => {}
            _ = shutdown => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        drop(gc);
        workers.join().await;

        let stats = &self.stats;
        info!(
            connections = stats.connections_accepted.load(Ordering::Relaxed),
            queued = stats.requests_queued.load(Ordering::Relaxed),
            rejected = stats.requests_rejected.load(Ordering::Relaxed),
            bytes_read = stats.bytes_read.load(Ordering::Relaxed),
            "Server stopped"
        );
    }
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, intake: Intake) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let intake = intake.clone();

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, intake).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
