//! Worker Pool
//!
//! A fixed number of Tokio tasks drain the request queue. Each worker loops:
//!
//! ```text
//! dequeue (wait up to `idle`) ──none──> check shutdown ──> loop
//!      │
//!      ▼
//! CommandHandler::execute   (locks PUT/DELETE keys, always releases)
//!      │
//!      ▼
//! write reply + elapsed line, close connection
//! ```
//!
//! A request, once dequeued, runs to completion; shutdown is only checked
//! between requests. Execution order across workers is not deterministic.
//! Only operations on the same key are serialized, by the lock table.

use crate::commands::CommandHandler;
use crate::protocol::Reply;
use crate::server::queue::{QueuedRequest, ReplySink, RequestQueue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// A handle to the running workers.
///
/// When this handle is dropped, the workers finish their current request and
/// stop.
#[derive(Debug)]
pub struct WorkerPool {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    /// Worker tasks
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers draining `queue`.
    pub fn start(
        size: usize,
        queue: Arc<RequestQueue>,
        handler: CommandHandler,
        idle: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..size)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&queue),
                    handler.clone(),
                    idle,
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        info!(workers = size, "Worker pool started");

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signals every worker to stop after its current request.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the pool and waits for every worker to exit.
    pub async fn join(mut self) {
        self.stop();
        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.await;
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main worker loop.
async fn worker_loop(
    id: usize,
    queue: Arc<RequestQueue>,
    handler: CommandHandler,
    idle: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            debug!(worker = id, "Worker received shutdown signal");
            return;
        }

        let Some(request) = queue.dequeue_timeout(idle).await else {
            continue;
        };

        process_request(id, &handler, request).await;
    }
}

/// Executes one request and answers its connection.
pub async fn process_request(worker: usize, handler: &CommandHandler, request: QueuedRequest) {
    let QueuedRequest {
        command,
        conn,
        addr,
        accepted_at,
    } = request;

    let reply = handler.execute(&command);
    trace!(worker, client = %addr, command = command.name(), reply = %reply, "Executed request");

    respond(conn, &reply, accepted_at).await;
}

/// Writes `reply` and closes the connection.
///
/// Write failures mean the client went away; they are logged and dropped.
pub async fn respond(mut conn: ReplySink, reply: &Reply, accepted_at: Instant) {
    let bytes = reply.serialize(accepted_at.elapsed());

    let result = async {
        conn.write_all(&bytes).await?;
        conn.flush().await?;
        conn.shutdown().await
    }
    .await;

    if let Err(e) = result {
        debug!(error = %e, "Failed to deliver reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_command;
    use crate::storage::keys::unix_now;
    use crate::storage::{LockTable, MemoryStorage, RecordStore};
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn create_handler() -> (CommandHandler, Arc<LockTable>) {
        let locks = Arc::new(LockTable::new());
        let store = RecordStore::new(Arc::new(MemoryStorage::new()));
        (CommandHandler::new(store, Arc::clone(&locks)), locks)
    }

    /// Builds a queued request and returns the client end of its connection.
    fn queued(request: &str) -> (QueuedRequest, DuplexStream) {
        let (client, server) = tokio::io::duplex(1024);
        let request = QueuedRequest {
            command: parse_command(request.as_bytes(), unix_now()).unwrap(),
            conn: Box::new(server),
            addr: "127.0.0.1:4000".parse().unwrap(),
            accepted_at: Instant::now(),
        };
        (request, client)
    }

    async fn read_reply(mut client: DuplexStream) -> String {
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_process_request_writes_reply_and_closes() {
        let (handler, _) = create_handler();

        let (request, client) = queued("PUT beta 60 world");
        process_request(0, &handler, request).await;
        let reply = read_reply(client).await;
        assert!(reply.starts_with("Successfully performed operation in "));
        assert!(reply.ends_with(" ms\n"));

        let (request, client) = queued("READ beta");
        process_request(0, &handler, request).await;
        let reply = read_reply(client).await;
        assert!(reply.starts_with("Value with key beta: world\nSuccessfully performed operation in "));
    }

    #[tokio::test]
    async fn test_locked_request_is_abandoned() {
        let (handler, locks) = create_handler();
        locks.acquire(b"k");

        let (request, client) = queued("DELETE k");
        process_request(0, &handler, request).await;
        assert_eq!(
            read_reply(client).await,
            "Failed to modify record because it's locked\n"
        );
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let (handler, _) = create_handler();
        let queue = Arc::new(RequestQueue::new());
        let pool = WorkerPool::start(4, Arc::clone(&queue), handler, Duration::from_millis(10));

        let mut clients = Vec::new();
        for i in 0..20 {
            let (request, client) = queued(&format!("PUT key{i} 60 value{i}"));
            queue.enqueue(request).unwrap();
            clients.push(client);
        }

        for client in clients {
            let reply = read_reply(client).await;
            assert!(reply.starts_with("Successfully performed operation"), "{reply}");
        }
        assert!(queue.is_empty());

        pool.join().await;
    }

    #[tokio::test]
    async fn test_pool_stops_on_drop() {
        let (handler, _) = create_handler();
        let queue = Arc::new(RequestQueue::new());

        {
            let _pool =
                WorkerPool::start(2, Arc::clone(&queue), handler, Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (request, _client) = queued("READ k");
        queue.enqueue(request).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Nobody is left to take it
        assert_eq!(queue.len(), 1);
    }
}
