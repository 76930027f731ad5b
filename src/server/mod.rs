//! # Server
//!
//! One [`Server`] type for stream and datagram networks. The caller supplies
//! a [`ConnectionHandler`] and never has to know which kind of transport is
//! underneath: stream connections are handed over as accepted, and each
//! datagram sender is turned into a virtual connection by the relay.
//!
//! ## Lifecycle
//!
//! ```text
//! build() ──► start() ──► running ──► stop() ──► stopped ──► start() ...
//! ```
//!
//! `start` binds and launches exactly one serving loop. `stop` closes the
//! listener or socket and waits for the loop and every per-peer write-back
//! task to exit. Handler tasks run detached and see their connection close.
//!
//! ## Example
//!
//! ```ignore
//! use tokio::io::AsyncWriteExt;
//!
//! let server = Server::new("udp", "127.0.0.1:7777", |mut conn: BoxConn| async move {
//!     let _ = conn.write_all(b"hello yourself").await;
//! })?;
//! server.start().await?;
//! ```

mod error;
mod handler;
mod peers;
mod relay;
#[allow(clippy::module_inception)]
mod server;
mod stats;
mod stream;

pub use error::{ServerError, ServerResult};
pub use handler::{ConnectionHandler, HandlerFuture};
pub use server::{Server, ServerBuilder};
pub use stats::ServerStats;
