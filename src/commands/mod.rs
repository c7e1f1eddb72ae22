//! Command Module
//!
//! Receives raw command chunks, executes them against the storage engine and
//! returns reply bytes.
//!
//! ```text
//! Stream bytes
//!       │
//!       ▼
//! ┌───────────────────┐
//! │  Request parser   │  (protocol module)
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │ CommandDispatcher │  (this module)
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  StorageEngine    │  (storage module)
//! └───────────────────┘
//! ```

pub mod handler;

pub use handler::{CommandDispatcher, DIAGNOSTIC_KEY};
