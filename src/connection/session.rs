//! Session Glue
//!
//! Wires transport lifecycle callbacks to the [`CommandDispatcher`] and the
//! [`ConnectionRegistry`]. The transport itself (handshake, framing,
//! encryption, retransmission) lives outside this crate and is seen only
//! through [`TransportConnection`] and [`TransportStream`].
//!
//! | Transport event      | Session call                    |
//! |----------------------|---------------------------------|
//! | connection accepted  | [`Session::on_connection_accepted`] |
//! | stream readable      | [`Session::on_stream_readable`]     |
//! | connection closed    | [`Session::on_connection_closed`]   |
//! | socket loop iteration| [`Session::on_tick`]                |
//!
//! ## Framing
//!
//! One readable event is one command: up to `read_buffer_size` bytes are
//! read and dispatched as a single chunk. A command that arrives split over
//! two events is seen as two (probably malformed) commands.

use crate::commands::CommandDispatcher;
use crate::config::ServerConfig;
use crate::connection::registry::{ConnectionId, ConnectionRegistry, TransportConnection};
use bytes::Bytes;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, trace};

/// A readable and writable byte stream owned by the transport.
pub trait TransportStream {
    fn id(&self) -> u64;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Errors surfaced to the transport binding.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to a stream failed
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Glue between transport callbacks and the command core.
#[derive(Debug)]
pub struct Session<C: ?Sized> {
    dispatcher: CommandDispatcher,
    registry: Mutex<ConnectionRegistry<C>>,
    read_buffer_size: usize,
}

impl<C: TransportConnection + ?Sized> Session<C> {
    pub fn new(dispatcher: CommandDispatcher, config: &ServerConfig) -> Self {
        Self {
            dispatcher: dispatcher.with_diagnostic_record(config.diagnostic_record),
            registry: Mutex::new(ConnectionRegistry::with_interval(config.timer_interval)),
            read_buffer_size: config.read_buffer_size.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, ConnectionRegistry<C>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// The transport accepted a new connection.
    pub fn on_connection_accepted(&self, connection: &Arc<C>) {
        info!(connection_id = connection.id(), "New connection");
        self.registry().register(connection, Instant::now());
    }

    /// The transport reported a connection as closed.
    pub fn on_connection_closed(&self, id: ConnectionId) -> bool {
        info!(connection_id = id, "Connection closed");
        self.registry().deregister(id)
    }

    /// One iteration of the transport's socket loop.
    pub fn on_tick(&self, now: Instant) -> usize {
        self.registry().tick(now)
    }

    /// A stream has bytes to read.
    ///
    /// Reads one chunk, executes it and writes the reply to the same stream.
    /// Returns the number of reply bytes written; an empty read writes
    /// nothing.
    pub fn on_stream_readable<S>(&self, stream: &mut S) -> Result<usize, SessionError>
    where
        S: TransportStream + ?Sized,
    {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = stream.read(&mut buf)?;
        if n == 0 {
            trace!(stream_id = stream.id(), "Empty read");
            return Ok(0);
        }

        debug!(stream_id = stream.id(), bytes = n, "Read from peer");
        let response = self.dispatch(&buf[..n]);
        stream.write_all(&response)?;
        Ok(response.len())
    }

    /// Executes one command chunk for transports that do their own I/O.
    pub fn dispatch(&self, chunk: &[u8]) -> Bytes {
        self.dispatcher.execute(chunk)
    }

    pub fn connection_count(&self) -> usize {
        self.registry().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::registry::tests::MockConnection;
    use crate::storage::StorageEngine;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct MockStream {
        incoming: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    impl MockStream {
        fn with_chunks(chunks: &[&str]) -> Self {
            Self {
                incoming: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                ..Default::default()
            }
        }
    }

    impl TransportStream for MockStream {
        fn id(&self) -> u64 {
            4
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.incoming.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.written.extend_from_slice(buf);
            Ok(())
        }
    }

    fn create_session(config: ServerConfig) -> Session<MockConnection> {
        let dispatcher = CommandDispatcher::new(Arc::new(StorageEngine::new()));
        Session::new(dispatcher, &config)
    }

    #[test]
    fn test_stream_readable_round_trip() {
        let session = create_session(ServerConfig::default());
        let mut stream = MockStream::with_chunks(&["set foo 5 0 3 bar\n", "get foo\n"]);

        assert_eq!(session.on_stream_readable(&mut stream).unwrap(), 7);
        session.on_stream_readable(&mut stream).unwrap();

        assert_eq!(&stream.written[..], b"STORED\nVALUE foo 5 3\nbar\nEND\n");
    }

    #[test]
    fn test_empty_read_writes_nothing() {
        let session = create_session(ServerConfig::default());
        let mut stream = MockStream::default();

        assert_eq!(session.on_stream_readable(&mut stream).unwrap(), 0);
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_read_is_capped_at_buffer_size() {
        let config = ServerConfig::default().with_read_buffer_size(7);
        let session = create_session(config);
        let mut stream = MockStream::with_chunks(&["version and more"]);

        session.on_stream_readable(&mut stream).unwrap();
        assert_eq!(&stream.written[..], b"VERSION 0.0.0");
    }

    #[test]
    fn test_write_failure_is_surfaced() {
        let session = create_session(ServerConfig::default());
        let mut stream = MockStream::with_chunks(&["version"]);
        stream.fail_writes = true;

        let err = session.on_stream_readable(&mut stream).unwrap_err();
        assert!(matches!(err, SessionError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_connection_lifecycle() {
        let session = create_session(ServerConfig::default());
        let conn = MockConnection::new(9);

        session.on_connection_accepted(&conn);
        assert_eq!(session.connection_count(), 1);

        assert_eq!(session.on_tick(Instant::now()), 0);
        assert_eq!(session.on_tick(Instant::now() + Duration::from_secs(2)), 1);
        assert_eq!(conn.checks(), 1);

        assert!(session.on_connection_closed(9));
        assert_eq!(session.connection_count(), 0);
        assert_eq!(session.on_tick(Instant::now() + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_diagnostic_record_follows_config() {
        let config = ServerConfig::default().with_diagnostic_record(false);
        let session = create_session(config);

        assert_eq!(&session.dispatch(b"get test")[..], b"END\n");
        assert!(session.dispatcher().storage().is_empty());
    }
}
