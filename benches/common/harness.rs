//! Benchmark harness utilities.
//!
//! Provides a Tokio runtime for async benchmarks and echo servers bound to
//! ephemeral loopback ports.

use std::net::SocketAddr;

use dualconn::{BoxConn, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Create a multi-threaded Tokio runtime for async benchmarks.
pub fn bench_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime for benchmarks")
}

/// Echo every read back to the peer as one write.
pub async fn echo(mut conn: BoxConn) {
    let mut buf = vec![0u8; 64 * 1024];
    while let Ok(n) = conn.read(&mut buf).await {
        if n == 0 || conn.write_all(&buf[..n]).await.is_err() {
            break;
        }
    }
}

/// Start an echo server on `network` and return it with its bound address.
pub fn start_echo(rt: &tokio::runtime::Runtime, network: &str) -> (Server, SocketAddr) {
    rt.block_on(async {
        let server = Server::new(network, "127.0.0.1:0", echo).expect("Failed to build server");
        server.start().await.expect("Failed to start server");
        let addr = server
            .local_addr()
            .await
            .and_then(|addr| addr.as_inet())
            .expect("Server has no inet address");
        (server, addr)
    })
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
