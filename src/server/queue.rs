//! Request Queue
//!
//! FIFO of parsed requests waiting for a worker. Connection tasks push to the
//! back, workers pop from the front; both sides may be many tasks at once.
//!
//! Workers either poll with [`RequestQueue::dequeue`] or wait on
//! [`RequestQueue::dequeue_timeout`], which parks until a request arrives or
//! the idle interval passes. Both preserve arrival order.
//!
//! The queue is unbounded unless built with a capacity, in which case a full
//! queue hands the request back to the caller instead of growing.

use crate::protocol::Command;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;

/// The write half a worker replies on.
pub type ReplySink = Box<dyn AsyncWrite + Send + Unpin>;

/// A parsed command waiting for a worker, with the connection to answer on.
pub struct QueuedRequest {
    /// What to execute
    pub command: Command,
    /// Where to write the reply; closed once the reply is written
    pub conn: ReplySink,
    /// Client address (for logging)
    pub addr: SocketAddr,
    /// When the connection was accepted, for the elapsed-time line
    pub accepted_at: Instant,
}

impl std::fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("command", &self.command)
            .field("addr", &self.addr)
            .field("accepted_at", &self.accepted_at)
            .finish_non_exhaustive()
    }
}

/// Errors that can occur while queueing a request.
#[derive(Error)]
pub enum QueueError {
    /// The queue is at capacity; the request is handed back for rejection
    #[error("request queue is full ({capacity} pending)")]
    Full {
        capacity: usize,
        request: Box<QueuedRequest>,
    },
}

impl std::fmt::Debug for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full { capacity, .. } => {
                f.debug_struct("Full").field("capacity", capacity).finish()
            }
        }
    }
}

/// Concurrent FIFO of pending requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<VecDeque<QueuedRequest>>,
    /// Queue capacity; 0 means unbounded
    capacity: usize,
    /// Wakes one idle worker per enqueue
    notify: Notify,
}

impl RequestQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue that holds at most `capacity` requests (0 = unbounded).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Appends a request.
    pub fn enqueue(&self, request: QueuedRequest) -> Result<(), QueueError> {
        {
            let mut pending = self.pending.lock();
            if self.capacity > 0 && pending.len() >= self.capacity {
                return Err(QueueError::Full {
                    capacity: self.capacity,
                    request: Box::new(request),
                });
            }
            pending.push_back(request);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Removes and returns the oldest request, if any.
    pub fn dequeue(&self) -> Option<QueuedRequest> {
        self.pending.lock().pop_front()
    }

    /// Removes the oldest request, waiting up to `idle` for one to arrive.
    pub async fn dequeue_timeout(&self, idle: Duration) -> Option<QueuedRequest> {
        if let Some(request) = self.dequeue() {
            return Some(request);
        }

        // A wakeup may belong to a request another worker already took, so
        // just look once more either way.
        let _ = tokio::time::timeout(idle, self.notify.notified()).await;
        self.dequeue()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
