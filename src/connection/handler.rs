//! Stream Transport over Tokio
//!
//! A stand-in for the real stream-multiplexing transport so the server can
//! run on its own: every accepted socket is one transport connection
//! carrying a single stream.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Socket accepted ──► Session::on_connection_accepted
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  Read up to N bytes          │◄─────┐
//!    │  Session::dispatch(chunk)    │      │
//!    │  Write reply                 │──────┘
//!    └──────────────────────────────┘
//!        │  EOF, I/O error, or idle timeout fired by check_timer()
//!        ▼
//! 3. Session::on_connection_closed
//! ```
//!
//! `check_timer` is where a real transport would retransmit; here it only
//! enforces an idle timeout.

use crate::connection::registry::{ConnectionId, TransportConnection};
use crate::connection::session::Session;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// The transport-side state of one socket.
#[derive(Debug)]
pub struct StreamConnection {
    id: ConnectionId,
    peer: String,
    idle_timeout: Duration,
    last_activity: Mutex<Instant>,
    close_tx: watch::Sender<bool>,
}

impl StreamConnection {
    /// Creates a connection with a fresh id.
    pub fn new(peer: impl Into<String>, idle_timeout: Duration) -> Arc<Self> {
        let (close_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer: peer.into(),
            idle_timeout,
            last_activity: Mutex::new(Instant::now()),
            close_tx,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Records traffic on the connection.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Returns true once the idle timeout has fired.
    pub fn is_closing(&self) -> bool {
        *self.close_tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }
}

impl TransportConnection for StreamConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn check_timer(&self) {
        let idle = self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed();

        if idle >= self.idle_timeout && !self.is_closing() {
            info!(connection_id = self.id, peer = %self.peer, idle_ms = idle.as_millis() as u64, "Idle timeout");
            self.close_tx.send_replace(true);
        }
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The connection's timer check found it idle for too long
    #[error("Idle timeout")]
    IdleTimeout,
}

/// Drives one connection's single stream.
pub struct ConnectionHandler<S> {
    stream: S,
    connection: Arc<StreamConnection>,
    session: Arc<Session<StreamConnection>>,
    stats: Arc<ConnectionStats>,
    read_buffer_size: usize,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        connection: Arc<StreamConnection>,
        session: Arc<Session<StreamConnection>>,
        stats: Arc<ConnectionStats>,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            stream,
            connection,
            session,
            stats,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Runs the connection until the peer goes away or it times out.
    ///
    /// The connection counts as open only while this runs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        self.stats.connection_opened();
        self.session.on_connection_accepted(&self.connection);

        let result = self.main_loop().await;

        let id = self.connection.id();
        match &result {
            Ok(()) => debug!(connection_id = id, "Peer closed stream"),
            Err(ConnectionError::IdleTimeout) => debug!(connection_id = id, "Closing idle connection"),
            Err(ConnectionError::IoError(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(connection_id = id, "Connection reset by peer")
            }
            Err(e) => warn!(connection_id = id, error = %e, "Connection error"),
        }

        self.session.on_connection_closed(id);
        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let mut close_rx = self.connection.subscribe();
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            if *close_rx.borrow_and_update() {
                return Err(ConnectionError::IdleTimeout);
            }

            let n = tokio::select! {
                read = self.stream.read(&mut buf) => read?,
                _ = close_rx.changed() => continue,
            };

            if n == 0 {
                return Ok(());
            }

            self.connection.touch();
            self.stats.bytes_read(n);
            trace!(connection_id = self.connection.id(), bytes = n, "Read data");

            let response = self.session.dispatch(&buf[..n]);
            self.stats.command_processed();

            self.stream.write_all(&response).await?;
            self.stream.flush().await?;
            self.stats.bytes_written(response.len());
        }
    }
}

/// Handles an accepted TCP socket to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    session: Arc<Session<StreamConnection>>,
    stats: Arc<ConnectionStats>,
    idle_timeout: Duration,
    read_buffer_size: usize,
) {
    let connection = StreamConnection::new(addr.to_string(), idle_timeout);
    let handler = ConnectionHandler::new(stream, connection, session, stats, read_buffer_size);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}
