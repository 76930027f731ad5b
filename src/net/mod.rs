//! # Network Capability
//!
//! Addresses, the duplex connection contract, and the socket capability the
//! server and client are written against.
//!
//! The [`Transport`] trait is the seam between the relay logic and real
//! sockets: [`TokioTransport`] binds tokio sockets, while
//! [`crate::testing::MockTransport`] hands out scripted ones.

mod addr;
mod conn;
mod datagram;
mod pipe;
mod tokio_transport;
mod transport;

pub use addr::{closed_error, is_closed, is_transient, NetAddr};
pub use conn::{AddrOverride, BoxConn, Conn};
pub use datagram::DatagramConn;
pub use pipe::{message_pipe, MessagePipe, PipeFeed};
pub use tokio_transport::{TokioListener, TokioPacketSocket, TokioTransport};
pub use transport::{NetworkKind, PacketSocket, StreamListener, Transport, STREAM_NETWORKS};
