//! dualconn echo server.
//!
//! Usage: `dualconn-echo [config.toml]`. Serves the configured network and
//! echoes every connection's bytes back to its peer until Ctrl-C.

use std::process::ExitCode;

use dualconn::config::{AppConfig, ConfigLoader, LoggingConfig};
use dualconn::{BoxConn, ServerBuilder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::new().load(path),
        None => Ok(AppConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dualconn-echo: {e}");
            return ExitCode::FAILURE;
        },
    };

    init_tracing(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting dualconn echo server");

    let server = match ServerBuilder::from_config(config.server).handler(echo).build() {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Invalid server configuration");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = server.start().await {
        error!(error = %e, "Failed to start server");
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    if let Err(e) = server.stop().await {
        error!(error = %e, "Failed to stop server");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.ansi)
        .init();
}

async fn echo(mut conn: BoxConn) {
    let peer = conn
        .remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    let mut buf = vec![0u8; 64 * 1024];
    let mut bytes = 0usize;

    // One write per read, so each datagram is echoed as one datagram.
    loop {
        let n = match conn.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Echo connection failed");
                return;
            },
        };
        if let Err(e) = conn.write_all(&buf[..n]).await {
            debug!(peer = %peer, error = %e, "Echo connection failed");
            return;
        }
        bytes += n;
    }

    debug!(peer = %peer, bytes, "Echo connection closed");
}
