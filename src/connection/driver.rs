//! Periodic Timer Driver
//!
//! Stands in for the transport's socket read loop, which in a real binding
//! calls [`Session::on_tick`] once per iteration. Here a Tokio task does it
//! on a fixed period.
//!
//! A check is due once `timer_interval` has elapsed, but it only runs when
//! the driver ticks. [`TimerDriver::for_interval`] ticks
//! [`TICKS_PER_INTERVAL`] times per interval so a due check is late by at
//! most a fraction of it.
//!
//! The handle stops the task when dropped.

use crate::connection::registry::TransportConnection;
use crate::connection::session::Session;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Driver ticks per registry timer interval.
pub const TICKS_PER_INTERVAL: u32 = 4;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Tick period used to drive a registry with the given timer interval.
pub fn driver_period(timer_interval: Duration) -> Duration {
    (timer_interval / TICKS_PER_INTERVAL).max(MIN_PERIOD)
}

/// A handle to the running timer driver.
#[derive(Debug)]
pub struct TimerDriver {
    shutdown_tx: watch::Sender<bool>,
}

impl TimerDriver {
    /// Starts ticking `session` every `period`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<C>(session: Arc<Session<C>>, period: Duration) -> Self
    where
        C: TransportConnection + ?Sized + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(driver_loop(session, period, shutdown_rx));

        info!(period_ms = period.as_millis() as u64, "Timer driver started");

        Self { shutdown_tx }
    }

    /// Starts ticking `session` often enough for a registry using
    /// `timer_interval`.
    pub fn for_interval<C>(session: Arc<Session<C>>, timer_interval: Duration) -> Self
    where
        C: TransportConnection + ?Sized + 'static,
    {
        Self::start(session, driver_period(timer_interval))
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn driver_loop<C>(
    session: Arc<Session<C>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    C: TransportConnection + ?Sized,
{
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Timer driver received shutdown signal");
                    return;
                }
            }
        }

        let fired = session.on_tick(Instant::now());
        if fired > 0 {
            trace!(fired = fired, "Timer checks run");
        }
    }
}
