//! Text Command Parser
//!
//! A command is one chunk of bytes. Newlines (and every other ASCII
//! whitespace byte) are treated as token separators, so
//! `set foo 5 0 3\nbar` and `set foo 5 0 3 bar` parse the same way.
//!
//! ```text
//! get <key>
//! set <key> <flag> <ttl> <len> <value>
//! version
//! ```
//!
//! ## Permissive numbers
//!
//! `flag`, `ttl` and `len` that are not valid integers are read as `0`.
//! No error is reported for them.
//!
//! ## Limitation
//!
//! The value is the fifth token taken verbatim, so values containing
//! whitespace cannot be stored. The declared `len` is parsed but not used
//! to delimit the value; replies report the actual stored length.

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The chunk contained no tokens at all
    #[error("empty command")]
    Empty,

    /// The command name is not one we know
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Too few arguments for a known command
    #[error("wrong number of arguments for '{command}': expected {expected}, got {got}")]
    MissingArgument {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `get <key>`
    Get { key: Bytes },

    /// `set <key> <flag> <ttl> <len> <value>`
    Set {
        key: Bytes,
        flag: i64,
        ttl_seconds: i64,
        declared_len: i64,
        value: Bytes,
    },

    /// `version`
    Version,
}

impl Request {
    /// Parses a single command chunk.
    ///
    /// # Example
    ///
    /// ```
    /// use streamkv::protocol::Request;
    ///
    /// let request = Request::parse(b"get foo\n").unwrap();
    /// assert_eq!(request, Request::Get { key: "foo".into() });
    /// ```
    pub fn parse(input: &[u8]) -> Result<Request, ParseError> {
        let tokens = tokenize(input);
        let (name, args) = tokens.split_first().ok_or(ParseError::Empty)?;

        match *name {
            b"get" => {
                require("get", args, 1)?;
                Ok(Request::Get {
                    key: Bytes::copy_from_slice(args[0]),
                })
            }
            b"set" => {
                require("set", args, 5)?;
                Ok(Request::Set {
                    key: Bytes::copy_from_slice(args[0]),
                    flag: parse_int(args[1]),
                    ttl_seconds: parse_int(args[2]),
                    declared_len: parse_int(args[3]),
                    value: Bytes::copy_from_slice(args[4]),
                })
            }
            b"version" => Ok(Request::Version),
            other => Err(ParseError::UnknownCommand(String::from_utf8_lossy(other).into_owned())),
        }
    }

    /// Returns the command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Set { .. } => "set",
            Request::Version => "version",
        }
    }
}

/// Splits a chunk into whitespace-separated tokens.
///
/// Runs of separators never yield empty tokens.
pub fn tokenize(input: &[u8]) -> Vec<&[u8]> {
    input
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

fn require(command: &'static str, args: &[&[u8]], expected: usize) -> Result<(), ParseError> {
    if args.len() < expected {
        return Err(ParseError::MissingArgument {
            command,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Parses a decimal integer, reading anything malformed as zero.
pub fn parse_int(token: &[u8]) -> i64 {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
