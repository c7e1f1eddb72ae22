//! streamkv server entry point.
//!
//! Sets up logging, the record store and the session, then accepts
//! connections on the stand-in socket transport until Ctrl+C.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use streamkv::commands::CommandDispatcher;
use streamkv::config::{self, ServerConfig};
use streamkv::connection::{handle_connection, ConnectionStats, Session, StreamConnection, TimerDriver};
use streamkv::storage::StorageEngine;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// A minimal in-memory key-value store.
#[derive(Debug, Parser)]
#[command(name = "streamkv", version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "STREAMKV_ADDR", default_value = config::DEFAULT_ADDR)]
    addr: String,

    /// Server identity presented by the transport
    #[arg(long, env = "STREAMKV_SERVER_NAME", default_value = config::DEFAULT_SERVER_NAME)]
    server_name: String,

    /// Minimum milliseconds between timer checks of one connection
    #[arg(long, default_value_t = 1000)]
    timer_interval_ms: u64,

    /// Seconds without traffic before a connection is dropped
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,

    /// Do not seed the diagnostic `test` record on `get`
    #[arg(long)]
    no_diagnostic_record: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig::new()
            .with_addr(cli.addr)
            .with_server_name(cli.server_name)
            .with_timer_interval(Duration::from_millis(cli.timer_interval_ms))
            .with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs))
            .with_diagnostic_record(!cli.no_diagnostic_record)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: ServerConfig = Cli::parse().into();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    let dispatcher = CommandDispatcher::new(Arc::clone(&storage));
    let session = Arc::new(Session::new(dispatcher, &config));
    let stats = Arc::new(ConnectionStats::new());

    if config.diagnostic_record {
        info!("Diagnostic record enabled: every get seeds key 'test'");
    }

    let _driver = TimerDriver::for_interval(Arc::clone(&session), config.timer_interval);

    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        server_name = %config.server_name,
        version = streamkv::VERSION,
        "streamkv listening"
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&session), Arc::clone(&stats), &config) => {}
        _ = shutdown => {}
    }

    let storage_stats = storage.stats();
    info!(
        keys = storage_stats.keys,
        gets = storage_stats.gets,
        hits = storage_stats.hits,
        sets = storage_stats.sets,
        expired = storage_stats.expired,
        "Server shutdown complete"
    );
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    session: Arc<Session<StreamConnection>>,
    stats: Arc<ConnectionStats>,
    config: &ServerConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    Arc::clone(&session),
                    Arc::clone(&stats),
                    config.idle_timeout,
                    config.read_buffer_size,
                ));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
