//! # Client
//!
//! Dials a server, splits incoming bytes into tokens with a caller-supplied
//! [`Decoder`](tokio_util::codec::Decoder), and hands each token to a
//! callback. Any `tokio_util` codec works: `BytesCodec` passes through
//! whatever each read returned, `LinesCodec` yields one line at a time.
//!
//! ```ignore
//! use tokio_util::codec::LinesCodec;
//!
//! let client = Client::new("udp", "127.0.0.1:7777", LinesCodec::new(), |line| {
//!     println!("{}", String::from_utf8_lossy(&line));
//! });
//! client.start().await?;
//! client.send(b"hello\n").await?;
//! client.stop().await?;
//! ```

#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::{Client, ReceiveFn};
pub use error::{ClientError, ClientResult};
