//! Connection Module
//!
//! Everything between the transport and the command core.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Transport (external, or handler.rs)           │
//! └───────┬──────────────────┬────────────────────┬─────────────┘
//!         │ accepted/closed  │ stream readable    │ loop iteration
//!         ▼                  ▼                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Session                            │
//! │   ConnectionRegistry ◄──────┐        CommandDispatcher      │
//! └─────────────────────────────┼───────────────────────────────┘
//!                               │ check_timer()
//!                               ▼
//!                     TransportConnection
//! ```
//!
//! - [`registry`]: per-connection timer-check cadence
//! - [`session`]: transport callbacks mapped onto the core
//! - [`driver`]: periodic `on_tick` task
//! - [`handler`]: Tokio socket transport used by the binary

pub mod driver;
pub mod handler;
pub mod registry;
pub mod session;

pub use driver::{driver_period, TimerDriver};
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, StreamConnection};
pub use registry::{ConnectionId, ConnectionRegistry, TransportConnection};
pub use session::{Session, SessionError, TransportStream};
