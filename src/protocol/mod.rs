//! Text Protocol Implementation
//!
//! This module provides the request parser and the reply types of the TTLKV
//! line protocol.
//!
//! ## Modules
//!
//! - `types`: Defines `Command`, `Reply` and the reply wire format
//! - `parser`: Splits and validates incoming request bytes
//!
//! ## Example
//!
//! ```
//! use ttlkv::protocol::{parse_command, Command, Reply};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let command = parse_command(b"READ beta", 0).unwrap();
//! assert_eq!(command, Command::Read { key: Bytes::from("beta") });
//!
//! let reply = Reply::NotFound;
//! assert_eq!(reply.serialize(Duration::ZERO), b"Value with such key cannot be found\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_command, parse_request, ParseError, ParseResult};
pub use types::{Command, Reply};
