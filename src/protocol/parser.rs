//! Request Parser
//!
//! Turns the raw bytes of one request into a [`Command`]. The caller has
//! already bounded the input size; this module only splits and validates.
//!
//! ## Rules
//!
//! 1. Fields are separated by ASCII whitespace. Keys and values are opaque
//!    bytes and are never decoded as UTF-8.
//! 2. The first field selects the operation, case-insensitively.
//! 3. `PUT key ttl value...` joins the remaining fields with single spaces to
//!    form the value. The deadline is computed here, at parse time.
//! 4. Any other first field must name a control key (see [`ControlKey`]).
//!
//! A failed parse is never queued. The connection replies with the error text
//! and closes.

use crate::config::ControlKey;
use crate::protocol::types::Command;
use crate::storage::keys::{self, unix_now};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request.
///
/// The `Display` text of each variant is the exact reply sent to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Empty input, or a first field that is neither a verb nor a control key
    #[error("Unknown command. Please, try READ, PUT, DELETE.")]
    UnknownCommand,

    /// The PUT ttl field is not a non-negative integer
    #[error("Wrong expiration time (should be one number in seconds)")]
    WrongExpiration,

    /// The deadline would not fit in the expiration index
    #[error("Expiration time is too far in the future")]
    ExpirationOutOfRange,

    /// Too few or too many fields for the verb
    #[error("Wrong number of arguments for {0}")]
    WrongArgumentCount(&'static str),

    /// The value is not acceptable for the control key
    #[error("Wrong value for {0} (should be a positive number up to {1})")]
    InvalidControlValue(&'static str, usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a request using the current wall-clock second for PUT deadlines.
pub fn parse_request(input: &[u8]) -> ParseResult<Command> {
    parse_command(input, unix_now())
}

/// Parses a request, computing PUT deadlines relative to `now` (unix seconds).
pub fn parse_command(input: &[u8], now: u64) -> ParseResult<Command> {
    let fields: Vec<&[u8]> = input
        .split(|b| b.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    let Some((verb, args)) = fields.split_first() else {
        return Err(ParseError::UnknownCommand);
    };

    if verb.eq_ignore_ascii_case(b"PUT") {
        parse_put(args, now)
    } else if verb.eq_ignore_ascii_case(b"READ") {
        let key = single_key(args, "READ")?;
        Ok(Command::Read { key })
    } else if verb.eq_ignore_ascii_case(b"DELETE") {
        let key = single_key(args, "DELETE")?;
        Ok(Command::Delete { key })
    } else if let Some(control) = ControlKey::lookup(verb) {
        parse_control(control, args)
    } else {
        Err(ParseError::UnknownCommand)
    }
}

fn parse_put(args: &[&[u8]], now: u64) -> ParseResult<Command> {
    let [key, ttl, rest @ ..] = args else {
        return Err(ParseError::WrongArgumentCount("PUT"));
    };

    let ttl_secs = std::str::from_utf8(ttl)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(ParseError::WrongExpiration)?;

    let expires_at =
        keys::deadline(now, ttl_secs).map_err(|_| ParseError::ExpirationOutOfRange)?;

    Ok(Command::Put {
        key: Bytes::copy_from_slice(key),
        value: Bytes::from(rest.join(&b' ')),
        expires_at,
    })
}

fn single_key(args: &[&[u8]], verb: &'static str) -> ParseResult<Bytes> {
    match args {
        [key] => Ok(Bytes::copy_from_slice(key)),
        _ => Err(ParseError::WrongArgumentCount(verb)),
    }
}

fn parse_control(control: ControlKey, args: &[&[u8]]) -> ParseResult<Command> {
    let [value] = args else {
        return Err(ParseError::WrongArgumentCount(control.name()));
    };

    if !control.accepts(value) {
        return Err(ParseError::InvalidControlValue(
            control.name(),
            control.max_value(),
        ));
    }

    Ok(Command::Control {
        name: control.name(),
        value: Bytes::copy_from_slice(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn parse(input: &str) -> ParseResult<Command> {
        parse_command(input.as_bytes(), NOW)
    }

    #[test]
    fn test_parse_put() {
        let cmd = parse("PUT alpha 60 hello").unwrap();
        assert_eq!(
            cmd,
            Command::Put {
                key: Bytes::from("alpha"),
                value: Bytes::from("hello"),
                expires_at: NOW + 60,
            }
        );
    }

    #[test]
    fn test_put_value_fields_are_rejoined() {
        let cmd = parse("PUT k 1 hello   big\tworld\r\n").unwrap();
        match cmd {
            Command::Put { value, .. } => assert_eq!(value, Bytes::from("hello big world")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_put_without_value_stores_empty() {
        let cmd = parse("PUT k 5").unwrap();
        match cmd {
            Command::Put { value, .. } => assert!(value.is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert!(matches!(parse("put k 1 v"), Ok(Command::Put { .. })));
        assert_eq!(parse("read k"), Ok(Command::Read { key: Bytes::from("k") }));
        assert_eq!(parse("Delete k"), Ok(Command::Delete { key: Bytes::from("k") }));
    }

    #[test]
    fn test_keys_keep_their_case() {
        assert_eq!(parse("READ MiXeD"), Ok(Command::Read { key: Bytes::from("MiXeD") }));
    }

    #[test]
    fn test_wrong_expiration() {
        assert_eq!(parse("PUT k abc v"), Err(ParseError::WrongExpiration));
        assert_eq!(parse("PUT k -5 v"), Err(ParseError::WrongExpiration));
        assert_eq!(parse("PUT k 1.5 v"), Err(ParseError::WrongExpiration));
    }

    #[test]
    fn test_expiration_out_of_range() {
        assert_eq!(
            parse("PUT k 99999999999 v"),
            Err(ParseError::ExpirationOutOfRange)
        );
        assert_eq!(
            parse("PUT k 18446744073709551615 v"),
            Err(ParseError::ExpirationOutOfRange)
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        assert_eq!(parse("PUT k"), Err(ParseError::WrongArgumentCount("PUT")));
        assert_eq!(parse("READ"), Err(ParseError::WrongArgumentCount("READ")));
        assert_eq!(parse("READ a b"), Err(ParseError::WrongArgumentCount("READ")));
        assert_eq!(parse("DELETE"), Err(ParseError::WrongArgumentCount("DELETE")));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("GET k"), Err(ParseError::UnknownCommand));
        assert_eq!(parse(""), Err(ParseError::UnknownCommand));
        assert_eq!(parse("   \n"), Err(ParseError::UnknownCommand));
    }

    #[test]
    fn test_control_command() {
        assert_eq!(
            parse("DB_REQ_SIZE 512"),
            Ok(Command::Control {
                name: "DB_REQ_SIZE",
                value: Bytes::from("512"),
            })
        );
        assert!(matches!(parse("db_req_size 64"), Ok(Command::Control { .. })));
    }

    #[test]
    fn test_control_command_validation() {
        assert_eq!(
            parse("DB_REQ_SIZE"),
            Err(ParseError::WrongArgumentCount("DB_REQ_SIZE"))
        );
        assert_eq!(
            parse("DB_REQ_SIZE lots"),
            Err(ParseError::InvalidControlValue("DB_REQ_SIZE", 1_048_576))
        );
        assert_eq!(
            parse("DB_REQ_SIZE 0"),
            Err(ParseError::InvalidControlValue("DB_REQ_SIZE", 1_048_576))
        );
    }

    #[test]
    fn test_control_value_above_limit_is_rejected() {
        for huge in ["1048577", "1099511627776", "18446744073709551615"] {
            let err = parse(&format!("DB_REQ_SIZE {huge}")).unwrap_err();
            assert_eq!(err, ParseError::InvalidControlValue("DB_REQ_SIZE", 1_048_576));
            assert_eq!(
                err.to_string(),
                "Wrong value for DB_REQ_SIZE (should be a positive number up to 1048576)"
            );
        }
        assert!(parse("DB_REQ_SIZE 1048576").is_ok());
    }

    #[test]
    fn test_binary_key() {
        let cmd = parse_command(b"READ \xff\xfe", NOW).unwrap();
        assert_eq!(cmd, Command::Read { key: Bytes::from_static(b"\xff\xfe") });
    }
}
