//! Server configuration.

use std::time::Duration;

/// Default bind address.
pub const DEFAULT_ADDR: &str = "localhost:4433";

/// Default server identity presented by the transport.
pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// How often each connection's timer logic may run.
pub const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_secs(1);

/// Largest chunk read from a stream per readable event.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Idle time after which the stand-in transport drops a connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by the session glue and the stand-in transport.
///
/// # Example
///
/// ```
/// use streamkv::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_addr("0.0.0.0:4433")
///     .with_timer_interval(Duration::from_millis(250));
/// assert_eq!(config.addr, "0.0.0.0:4433");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to bind
    pub addr: String,
    /// Identity string handed to the transport
    pub server_name: String,
    /// Minimum spacing between two timer-checks of one connection
    pub timer_interval: Duration,
    /// Bytes read per stream-readable event
    pub read_buffer_size: usize,
    /// Idle timeout enforced by the stand-in transport
    pub idle_timeout: Duration,
    /// Seed the diagnostic record on every `get`
    pub diagnostic_record: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            timer_interval: DEFAULT_TIMER_INTERVAL,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            diagnostic_record: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn with_timer_interval(mut self, interval: Duration) -> Self {
        self.timer_interval = interval;
        self
    }

    /// Sets the per-event read size. Zero is bumped to one byte.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_diagnostic_record(mut self, enabled: bool) -> Self {
        self.diagnostic_record = enabled;
        self
    }
}
