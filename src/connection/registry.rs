//! Connection Registry
//!
//! Keeps one liveness entry per transport connection and, on every sweep,
//! asks each connection that has not been checked for at least one interval
//! to run its timer logic.
//!
//! ```text
//!  tick(now)
//!     │
//!     ▼
//!  for each entry ──► handle dropped?           ──► prune
//!                 └─► now - last_check >= interval ──► check_timer(), last_check = now
//! ```
//!
//! The registry only holds [`Weak`] references: the transport owns its
//! connections.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::DEFAULT_TIMER_INTERVAL;

/// Identifier the transport assigns to a connection.
pub type ConnectionId = u64;

/// The part of a transport connection the registry drives.
pub trait TransportConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Advances the transport's retransmission and timeout state.
    ///
    /// Must not block.
    fn check_timer(&self);
}

#[derive(Debug)]
struct LivenessEntry<C: ?Sized> {
    connection: Weak<C>,
    last_timer_check: Instant,
}

/// Per-connection timer-check bookkeeping.
#[derive(Debug)]
pub struct ConnectionRegistry<C: ?Sized> {
    entries: HashMap<ConnectionId, LivenessEntry<C>>,
    interval: Duration,
}

impl<C: TransportConnection + ?Sized> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TransportConnection + ?Sized> ConnectionRegistry<C> {
    /// Creates a registry with the default one-second interval.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_TIMER_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts tracking `connection`, treating `now` as its last timer-check.
    ///
    /// Registering an id again replaces the previous entry.
    pub fn register(&mut self, connection: &Arc<C>, now: Instant) {
        let id = connection.id();
        self.entries.insert(
            id,
            LivenessEntry {
                connection: Arc::downgrade(connection),
                last_timer_check: now,
            },
        );
        debug!(connection_id = id, tracked = self.entries.len(), "Connection registered");
    }

    /// Stops tracking a connection. Returns `true` if it was tracked.
    pub fn deregister(&mut self, id: ConnectionId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            debug!(connection_id = id, tracked = self.entries.len(), "Connection deregistered");
        }
        removed
    }

    /// Runs the timer-check of every connection that is due and returns how
    /// many were run.
    pub fn tick(&mut self, now: Instant) -> usize {
        let interval = self.interval;
        let mut fired = 0;

        self.entries.retain(|id, entry| {
            let Some(connection) = entry.connection.upgrade() else {
                debug!(connection_id = *id, "Pruning dropped connection");
                return false;
            };

            if now.saturating_duration_since(entry.last_timer_check) >= interval {
                trace!(connection_id = *id, "Running timer check");
                connection.check_timer();
                entry.last_timer_check = now;
                fired += 1;
            }
            true
        });

        fired
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
