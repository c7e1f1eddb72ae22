//! # streamkv - A Minimal In-Memory Key-Value Store
//!
//! streamkv keeps records in memory and serves them through a small,
//! whitespace-delimited text protocol modeled on memcached. It is meant to
//! sit behind a stream-multiplexing transport: the transport owns
//! connections, streams and their timers, and calls into this crate when
//! something happens.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Transport (external)                         │
//! └──────┬───────────────────────┬──────────────────────────┬───────────┘
//!        │ accepted / closed     │ stream readable          │ loop tick
//!        ▼                       ▼                          ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Session                                │
//! │  ┌────────────────────┐        ┌───────────────────┐                │
//! │  │ ConnectionRegistry │        │ CommandDispatcher │                │
//! │  │  (timer cadence)   │        └─────────┬─────────┘                │
//! │  └────────────────────┘                  ▼                          │
//! │                              ┌───────────────────────┐              │
//! │                              │     StorageEngine     │              │
//! │                              │  (sharded, lazy TTL)  │              │
//! │                              └───────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! | Command                             | Reply                                      |
//! |-------------------------------------|--------------------------------------------|
//! | `get <key>`                         | `VALUE <key> <flag> <len>\n<value>\nEND\n` or `END\n` |
//! | `set <key> <flag> <ttl> <len> <value>` | `STORED\n`                              |
//! | `version`                           | `VERSION 0.0.0`                            |
//! | anything else                       | `ERROR\n`                                  |
//!
//! ## Quick Start
//!
//! ```
//! use streamkv::{CommandDispatcher, StorageEngine};
//! use std::sync::Arc;
//!
//! let dispatcher = CommandDispatcher::new(Arc::new(StorageEngine::new()));
//!
//! assert_eq!(&dispatcher.execute(b"set foo 5 0 3 bar")[..], b"STORED\n");
//! assert_eq!(&dispatcher.execute(b"get foo")[..], b"VALUE foo 5 3\nbar\nEND\n");
//! assert_eq!(&dispatcher.execute(b"get nope")[..], b"END\n");
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: record store with lazy TTL expiry
//! - [`protocol`]: command parser and reply types
//! - [`commands`]: the command dispatcher
//! - [`connection`]: connection registry, session glue, Tokio transport
//! - [`config`]: server settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandDispatcher;
pub use config::ServerConfig;
pub use connection::{
    handle_connection, ConnectionRegistry, ConnectionStats, Session, StreamConnection, TimerDriver,
    TransportConnection, TransportStream,
};
pub use protocol::{ParseError, Request, Response};
pub use storage::{Clock, ManualClock, Record, StorageEngine, SystemClock};

/// Version of streamkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
