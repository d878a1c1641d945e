//! Connection Intake
//!
//! This module handles the front half of every client connection. Each
//! connection carries exactly one request; intake reads it, parses it, and
//! either queues it for a worker or answers it directly.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. Single bounded read (max request size + 1 bytes)
//!        │
//!        ├── more than max size ───> "Request exceeds max possible size", close
//!        │
//!        ▼
//! 3. Parse
//!        │
//!        ├── parse error ──────────> error text, close
//!        │
//!        ▼
//! 4. Enqueue with arrival time
//!        │
//!        ├── queue full ───────────> "Server is busy...", close
//!        │
//!        ▼
//! 5. A worker executes, replies, and closes
//! ```
//!
//! Protocol errors never reach the queue or storage.

use crate::config::MAX_REQUEST_SIZE_LIMIT;
use crate::protocol::{parse_request, Reply};
use crate::server::queue::{QueueError, QueuedRequest, RequestQueue, ReplySink};
use crate::server::worker::respond;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Statistics for connection intake
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Requests handed to the queue
    pub requests_queued: AtomicU64,
    /// Requests answered at intake (too large, unparsable, queue full)
    pub requests_rejected: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_queued(&self) {
        self.requests_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection before any reply is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client closed the connection without sending anything
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client did not send a request in time
    #[error("Timed out waiting for request")]
    Timeout,
}

/// Everything intake needs, shared by all connection tasks.
#[derive(Debug, Clone)]
pub struct Intake {
    /// Where parsed requests go
    pub queue: Arc<RequestQueue>,
    /// Largest accepted request in bytes
    pub max_request_size: usize,
    /// How long to wait for the request bytes
    pub request_timeout: Duration,
    /// Intake statistics (shared)
    pub stats: Arc<ConnectionStats>,
}

impl Intake {
    /// Reads one request from `reader`, bounded by size and time.
    ///
    /// Returns `Ok(None)` if the request exceeds the maximum size.
    async fn read_request<R: AsyncRead + Unpin>(
        &self,
        reader: &mut R,
    ) -> Result<Option<Vec<u8>>, ConnectionError> {
        // One byte over the limit tells "exactly max" from "too large"
        let limit = self.max_request_size.min(MAX_REQUEST_SIZE_LIMIT) + 1;
        let mut buf = vec![0u8; limit];

        let n = tokio::time::timeout(self.request_timeout, reader.read(&mut buf))
            .await
            .map_err(|_| ConnectionError::Timeout)??;

        if n == 0 {
            return Err(ConnectionError::ClientDisconnected);
        }
        self.stats.bytes_read(n);

        if n == limit {
            return Ok(None);
        }

        buf.truncate(n);
        Ok(Some(buf))
    }

    /// Takes one request from a connection through to the queue.
    ///
    /// `reader` and `conn` are the two halves of the same connection.
    pub async fn accept<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
        conn: ReplySink,
        addr: SocketAddr,
        accepted_at: Instant,
    ) -> Result<(), ConnectionError> {
        self.stats.connection_opened();

        let Some(raw) = self.read_request(&mut reader).await? else {
            warn!(client = %addr, max = self.max_request_size, "Request exceeds max possible size");
            self.stats.request_rejected();
            respond(conn, &Reply::TooLarge, accepted_at).await;
            return Ok(());
        };

        let command = match parse_request(&raw) {
            Ok(command) => command,
            Err(e) => {
                debug!(client = %addr, error = %e, "Rejected malformed request");
                self.stats.request_rejected();
                respond(conn, &Reply::Rejected(e), accepted_at).await;
                return Ok(());
            }
        };

        let request = QueuedRequest {
            command,
            conn,
            addr,
            accepted_at,
        };

        match self.queue.enqueue(request) {
            Ok(()) => {
                self.stats.request_queued();
                trace!(client = %addr, "Request pushed to queue");
            }
            Err(QueueError::Full { capacity, request }) => {
                warn!(client = %addr, capacity, "Request queue is full");
                self.stats.request_rejected();
                respond(request.conn, &Reply::Busy, request.accepted_at).await;
            }
        }

        Ok(())
    }
}

/// Handles a freshly accepted TCP connection.
///
/// The read half is dropped once the request is read; the write half travels
/// with the request to a worker.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, intake: Intake) {
    let accepted_at = Instant::now();
    let (reader, writer) = stream.into_split();

    if let Err(e) = intake.accept(reader, Box::new(writer), addr, accepted_at).await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended without a request");
            }
        }
    }
}
