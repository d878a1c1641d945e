//! Protocol Data Types
//!
//! TTLKV speaks a line-oriented text protocol. A client opens a connection,
//! writes one request, reads one reply, and the server closes the connection.
//!
//! ## Requests
//!
//! ```text
//! PUT <key> <ttl_seconds> <value...>
//! READ <key>
//! DELETE <key>
//! <CONTROL_KEY> <value>
//! ```
//!
//! ## Replies
//!
//! Every reply line ends with `\n`. Successful replies are followed by an
//! elapsed-time line:
//!
//! ```text
//! Value with key beta: world
//! Successfully performed operation in 3 ms
//! ```
//!
//! Error replies (not found, locked, storage failures, protocol errors) carry
//! no elapsed-time line. The not-found text is stable: clients compare it
//! byte-for-byte to detect expiration.

use crate::protocol::parser::ParseError;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// The line terminator used by the protocol
pub const LF: &[u8] = b"\n";

/// Reply when a READ finds nothing.
pub const NOT_FOUND: &str = "Value with such key cannot be found";

/// Reply when another mutation holds the key.
pub const LOCKED: &str = "Failed to modify record because it's locked";

/// Reply when the request is larger than the configured maximum.
pub const TOO_LARGE: &str = "Request exceeds max possible size";

/// Reply when the request queue is at capacity.
pub const BUSY: &str = "Server is busy, please retry later";

/// A parsed request, ready to be queued and executed by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store `value` under `key` until unix second `expires_at`
    Put {
        key: Bytes,
        value: Bytes,
        expires_at: u64,
    },

    /// Point lookup of `key`
    Read { key: Bytes },

    /// Remove `key` and its expiration entry
    Delete { key: Bytes },

    /// Overwrite the administrative setting `name`
    Control { name: &'static str, value: Bytes },
}

impl Command {
    /// The verb, as clients spell it.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Put { .. } => "PUT",
            Command::Read { .. } => "READ",
            Command::Delete { .. } => "DELETE",
            Command::Control { name, .. } => *name,
        }
    }

}

/// The terminal reply written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// PUT or DELETE succeeded; only the elapsed-time line is sent
    Done,

    /// READ hit
    Value { key: Bytes, value: Bytes },

    /// READ miss
    NotFound,

    /// Another PUT/DELETE/eviction holds the key
    Locked,

    /// Storage failure while executing the named verb
    StorageFailure { command: &'static str },

    /// A control key was updated
    ControlSet { name: &'static str, value: Bytes },

    /// The request could not be parsed
    Rejected(ParseError),

    /// The request exceeded the maximum size
    TooLarge,

    /// The request queue is full
    Busy,
}

impl Reply {
    /// Returns true if the reply is followed by the elapsed-time line.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Reply::Done | Reply::Value { .. } | Reply::ControlSet { .. }
        )
    }

    /// Serializes the reply for the wire.
    ///
    /// `elapsed` is the time since the connection was accepted; it is only
    /// written for successful replies.
    pub fn serialize(&self, elapsed: Duration) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf, elapsed);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>, elapsed: Duration) {
        match self {
            Reply::Done => {}
            Reply::Value { key, value } => {
                buf.extend_from_slice(b"Value with key ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(b": ");
                buf.extend_from_slice(value);
                buf.extend_from_slice(LF);
            }
            Reply::ControlSet { name, value } => {
                buf.extend_from_slice(format!("Command {} value is set to ", name).as_bytes());
                buf.extend_from_slice(value);
                buf.extend_from_slice(b" and will be changed after server restart.");
                buf.extend_from_slice(LF);
            }
            other => {
                buf.extend_from_slice(other.to_string().as_bytes());
                buf.extend_from_slice(LF);
            }
        }

        if self.is_success() {
            buf.extend_from_slice(
                format!("Successfully performed operation in {} ms", elapsed.as_millis()).as_bytes(),
            );
            buf.extend_from_slice(LF);
        }
    }
}

/// Readable one-line form used in logs. Wire bytes come from `serialize_into`,
/// which writes nothing for `Done` and keeps `Value` payloads binary.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done => write!(f, "OK"),
            Reply::Value { key, value } => write!(
                f,
                "Value with key {}: {}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(value)
            ),
            Reply::NotFound => f.write_str(NOT_FOUND),
            Reply::Locked => f.write_str(LOCKED),
            Reply::StorageFailure { command: "READ" } => write!(f, "Error getting record"),
            Reply::StorageFailure { command } => write!(f, "Error while performing {}", command),
            Reply::ControlSet { name, value } => write!(
                f,
                "Command {} value is set to {} and will be changed after server restart.",
                name,
                String::from_utf8_lossy(value)
            ),
            Reply::Rejected(e) => write!(f, "{}", e),
            Reply::TooLarge => f.write_str(TOO_LARGE),
            Reply::Busy => f.write_str(BUSY),
        }
    }
}
