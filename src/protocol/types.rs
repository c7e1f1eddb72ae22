//! Response Types
//!
//! Every command produces exactly one [`Response`]. The wire forms are:
//!
//! | Response  | Bytes                                    |
//! |-----------|------------------------------------------|
//! | `Value`   | `VALUE <key> <flag> <len>\n<value>\nEND\n` |
//! | `End`     | `END\n`                                  |
//! | `Stored`  | `STORED\n`                               |
//! | `Version` | `VERSION 0.0.0` (no terminator)          |
//! | `Error`   | `ERROR\n`                                |

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Terminator line closing every `get` reply.
pub const END: &[u8] = b"END\n";

const VALUE_PREFIX: &[u8] = b"VALUE ";

/// Acknowledgement for `set`.
pub const STORED: &[u8] = b"STORED\n";

/// Generic failure token for unknown or malformed commands.
pub const ERROR: &[u8] = b"ERROR\n";

/// Reply to `version`. Sent without a trailing newline.
pub const VERSION: &[u8] = b"VERSION 0.0.0";

/// A reply to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A `get` hit.
    Value { key: Bytes, flag: i64, value: Bytes },

    /// A `get` miss (absent or expired).
    End,

    /// A `set` acknowledgement.
    Stored,

    /// The `version` reply.
    Version,

    /// Unknown command or too few arguments.
    Error,
}

impl Response {
    /// Serializes the response to its wire format.
    pub fn serialize(&self) -> Bytes {
        match self {
            Response::Value { key, flag, value } => {
                let numbers = format!(" {} {}\n", flag, value.len());
                let mut buf = BytesMut::with_capacity(
                    VALUE_PREFIX.len() + key.len() + numbers.len() + value.len() + 1 + END.len(),
                );
                buf.put_slice(VALUE_PREFIX);
                buf.put_slice(key);
                buf.put_slice(numbers.as_bytes());
                buf.put_slice(value);
                buf.put_u8(b'\n');
                buf.put_slice(END);
                buf.freeze()
            }
            Response::End => Bytes::from_static(END),
            Response::Stored => Bytes::from_static(STORED),
            Response::Version => Bytes::from_static(VERSION),
            Response::Error => Bytes::from_static(ERROR),
        }
    }

    /// Returns true for the `ERROR` token.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Value { key, flag, value } => {
                write!(f, "VALUE {} {} {}", String::from_utf8_lossy(key), flag, value.len())
            }
            Response::End => write!(f, "END"),
            Response::Stored => write!(f, "STORED"),
            Response::Version => write!(f, "VERSION 0.0.0"),
            Response::Error => write!(f, "ERROR"),
        }
    }
}
