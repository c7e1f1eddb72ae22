//! Storage Module
//!
//! The record store behind the command dispatcher: a sharded map from key to
//! [`Record`] with TTL checked lazily on read.
//!
//! ## Example
//!
//! ```
//! use streamkv::storage::{ManualClock, StorageEngine};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let engine = StorageEngine::with_clock(clock.clone());
//!
//! engine.set("session", "token123", 0, 60);
//! assert!(engine.get("session").is_some());
//!
//! clock.advance(60);
//! assert!(engine.get("session").is_none());
//! ```

pub mod clock;
pub mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Record, StorageEngine, StorageStats};
