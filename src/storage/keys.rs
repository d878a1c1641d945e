//! Key Encoding Scheme
//!
//! Every logical record occupies two entries of the same ordered store:
//!
//! ```text
//! data:        '0' || key                                  -> value
//! expiration:  '1' || zero-padded unix seconds || hash(key) -> key
//! ```
//!
//! Because the timestamp is fixed-width and left-padded with zeros, plain
//! lexicographic ordering of expiration keys is deadline ordering. The garbage
//! collector relies on this to scan earliest-deadline-first and stop at the
//! first entry that is still in the future.
//!
//! The trailing hash only disambiguates keys that expire in the same second.
//! It is never decoded; the entry's value is the back-pointer to the record.

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128;

/// Prefix byte of the data namespace.
pub const DATA_PREFIX: u8 = b'0';

/// Prefix byte of the time-ordered expiration namespace.
pub const EXPIRATION_PREFIX: u8 = b'1';

/// Number of decimal digits used for the expiration timestamp.
pub const TIMESTAMP_WIDTH: usize = 10;

/// Largest unix timestamp that fits in [`TIMESTAMP_WIDTH`] digits.
pub const MAX_TIMESTAMP: u64 = 9_999_999_999;

/// Length of the content hash appended to expiration keys.
pub const HASH_LEN: usize = 16;

/// Length of an encoded expiration key.
pub const EXPIRATION_KEY_LEN: usize = 1 + TIMESTAMP_WIDTH + HASH_LEN;

/// Errors produced while encoding or decoding storage keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The timestamp needs more digits than the index reserves
    #[error("expiration timestamp {0} does not fit in the expiration index")]
    TimestampOverflow(u64),

    /// The key is not a well-formed expiration index key
    #[error("malformed expiration key ({0} bytes)")]
    MalformedExpirationKey(usize),
}

/// Returns the current wall-clock time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Encodes the data-namespace key for a logical key.
pub fn data_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(DATA_PREFIX);
    out.extend_from_slice(key);
    out
}

/// Encodes the expiration-namespace key for `key` expiring at `expires_at`.
///
/// Fails instead of producing a wider key, since a wider key would sort out of
/// deadline order.
pub fn expiration_key(key: &[u8], expires_at: u64) -> Result<Vec<u8>, KeyError> {
    if expires_at > MAX_TIMESTAMP {
        return Err(KeyError::TimestampOverflow(expires_at));
    }

    let mut out = Vec::with_capacity(EXPIRATION_KEY_LEN);
    out.push(EXPIRATION_PREFIX);
    out.extend_from_slice(format!("{:0width$}", expires_at, width = TIMESTAMP_WIDTH).as_bytes());
    out.extend_from_slice(&xxh3_128(key).to_be_bytes());
    Ok(out)
}

/// Decodes the deadline embedded in an expiration-namespace key.
pub fn decode_expiration(encoded: &[u8]) -> Result<u64, KeyError> {
    if encoded.len() != EXPIRATION_KEY_LEN || encoded[0] != EXPIRATION_PREFIX {
        return Err(KeyError::MalformedExpirationKey(encoded.len()));
    }

    let digits = &encoded[1..=TIMESTAMP_WIDTH];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(KeyError::MalformedExpirationKey(encoded.len()));
    }

    // All ASCII digits, at most ten of them: cannot overflow a u64.
    Ok(digits
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

/// Adds `ttl_secs` to `now`, rejecting deadlines the index cannot encode.
pub fn deadline(now: u64, ttl_secs: u64) -> Result<u64, KeyError> {
    match now.checked_add(ttl_secs) {
        Some(at) if at <= MAX_TIMESTAMP => Ok(at),
        Some(at) => Err(KeyError::TimestampOverflow(at)),
        None => Err(KeyError::TimestampOverflow(u64::MAX)),
    }
}
