//! Server Configuration
//!
//! Two kinds of settings exist:
//!
//! - Process settings ([`ServerConfig`]): bind address, storage path, worker
//!   count and internal timings. Fixed for the life of the process.
//! - Control keys ([`ControlKey`]): administrative values persisted as bare
//!   keys in the store. A client can overwrite them with `NAME value`; the new
//!   value is read back at the next startup.

use crate::storage::RecordStore;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Default TCP port
pub const DEFAULT_PORT: u16 = 2222;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default storage path
pub const DEFAULT_DB_PATH: &str = "db";

/// Default number of workers draining the request queue
pub const DEFAULT_WORKERS: usize = 10;

/// Default maximum request size in bytes
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 256;

/// Largest value `DB_REQ_SIZE` may take (1 MiB). Intake allocates a buffer of
/// this size per connection.
pub const MAX_REQUEST_SIZE_LIMIT: usize = 1024 * 1024;

/// Administrative settings stored as bare keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// Largest request, in bytes, the server will read
    MaxRequestSize,
}

impl ControlKey {
    /// Every registered control key.
    pub const ALL: [ControlKey; 1] = [ControlKey::MaxRequestSize];

    /// The storage key, which is also the command verb.
    pub fn name(self) -> &'static str {
        match self {
            ControlKey::MaxRequestSize => "DB_REQ_SIZE",
        }
    }

    /// Finds the control key named by `token`, ignoring ASCII case.
    pub fn lookup(token: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.name().as_bytes().eq_ignore_ascii_case(token))
    }

    /// Largest value this key accepts.
    pub fn max_value(self) -> usize {
        match self {
            ControlKey::MaxRequestSize => MAX_REQUEST_SIZE_LIMIT,
        }
    }

    /// Returns true if `value` is acceptable for this key.
    pub fn accepts(self, value: &[u8]) -> bool {
        parse_bounded(value, self.max_value()).is_some()
    }
}

/// Parses a positive integer no larger than `max`.
fn parse_bounded(value: &[u8], max: usize) -> Option<usize> {
    std::str::from_utf8(value)
        .ok()?
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=max).contains(n))
}

/// Reads the persisted maximum request size.
///
/// A missing value is initialised to [`DEFAULT_MAX_REQUEST_SIZE`] and written
/// back, so the setting is visible in the store from the first run. An
/// unreadable or out-of-range value falls back to the default without
/// overwriting it.
pub fn load_max_request_size(store: &RecordStore) -> Result<usize, crate::storage::StoreError> {
    let key = ControlKey::MaxRequestSize;
    let name = key.name();

    let size = match store.control_value(name)? {
        Some(raw) => parse_bounded(&raw, key.max_value()).unwrap_or_else(|| {
            warn!(
                value = %String::from_utf8_lossy(&raw),
                default = DEFAULT_MAX_REQUEST_SIZE,
                "Stored max request size is invalid, using default"
            );
            DEFAULT_MAX_REQUEST_SIZE
        }),
        None => {
            store.set_control_value(name, DEFAULT_MAX_REQUEST_SIZE.to_string().as_bytes())?;
            DEFAULT_MAX_REQUEST_SIZE
        }
    };

    info!(bytes = size, "Max request size loaded");
    Ok(size)
}

/// Process-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path of the redb database file
    pub db_path: PathBuf,
    /// Number of workers draining the request queue
    pub workers: usize,
    /// Queue capacity; 0 means unbounded
    pub max_queue_len: usize,
    /// How long an idle worker waits for a request before re-checking shutdown
    pub worker_idle: Duration,
    /// Pause between garbage collection cycles
    pub gc_interval: Duration,
    /// How long intake waits for the request bytes
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            workers: DEFAULT_WORKERS,
            max_queue_len: 0,
            worker_idle: Duration::from_millis(100),
            gc_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
