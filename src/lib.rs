//! # dualconn
//!
//! One connection abstraction over stream and datagram transports.
//!
//! A [`Server`] hands every connection to the same handler, whether the
//! network is `tcp`, `unix`, `udp` or `unixgram`. Stream connections are
//! passed through as accepted. Datagram sockets go through a relay that
//! gives every sender its own virtual duplex connection, so a handler
//! written against plain reads and writes serves UDP peers unchanged.
//!
//! ## Features
//!
//! - Stream accept loop and datagram relay behind one [`Server`] lifecycle
//! - Per-peer virtual connections reporting the real local/remote addresses
//! - [`Client`] with a pluggable `tokio_util` decoder
//! - Scripted transports in [`testing`] for deterministic tests
//!
//! ## Modules
//!
//! - [`net`]: addresses, the connection contract and the transport capability
//! - [`server`]: lifecycle, accept loop and datagram relay
//! - [`client`]: dial, tokenize and callback loop
//! - [`config`]: TOML configuration

pub mod client;
pub mod config;
pub mod net;
pub mod server;
pub mod testing;

pub use client::{Client, ClientError, ClientResult};
pub use net::{BoxConn, Conn, NetAddr};
pub use server::{ConnectionHandler, Server, ServerBuilder, ServerError, ServerResult};
