//! Text Protocol Implementation
//!
//! Whitespace-delimited commands in, fixed reply tokens out.
//!
//! - [`parser`]: turns a byte chunk into a [`Request`]
//! - [`types`]: the [`Response`] type and its wire format

pub mod parser;
pub mod types;

pub use parser::{tokenize, ParseError, Request};
pub use types::Response;
