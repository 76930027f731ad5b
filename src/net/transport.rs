//! The socket capability consumed by servers and clients.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use super::addr::NetAddr;
use super::conn::BoxConn;

/// Network names served by a stream accept loop. Every other name is
/// treated as datagram-oriented.
pub const STREAM_NETWORKS: [&str; 5] = ["tcp", "tcp4", "tcp6", "unix", "unixpacket"];

/// Transport family of a network name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Connection-oriented, ordered byte transport.
    Stream,

    /// Connectionless, message-oriented transport.
    Datagram,
}

impl NetworkKind {
    /// Classify a network name such as `"tcp"` or `"udp"`.
    #[must_use]
    pub fn classify(network: &str) -> Self {
        if STREAM_NETWORKS.contains(&network) {
            Self::Stream
        } else {
            Self::Datagram
        }
    }

    /// Returns `true` for stream transports.
    #[must_use]
    pub fn is_stream(self) -> bool {
        matches!(self, Self::Stream)
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Datagram => write!(f, "datagram"),
        }
    }
}

/// A bound stream listener.
#[async_trait]
pub trait StreamListener: Send + Sync {
    /// Wait for the next inbound connection.
    ///
    /// After [`close`](Self::close) this returns a terminal error,
    /// including for an accept that was already pending.
    async fn accept(&self) -> io::Result<BoxConn>;

    /// The address the listener is bound to.
    fn local_addr(&self) -> io::Result<NetAddr>;

    /// Stop accepting. Idempotent.
    fn close(&self);
}

/// A bound datagram socket.
#[async_trait]
pub trait PacketSocket: Send + Sync {
    /// Receive one datagram into `buf`, returning its length and sender.
    ///
    /// Datagrams larger than `buf` are truncated.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, NetAddr)>;

    /// Send one datagram to `target`.
    async fn send_to(&self, buf: &[u8], target: &NetAddr) -> io::Result<usize>;

    /// The address the socket is bound to.
    fn local_addr(&self) -> io::Result<NetAddr>;

    /// Close the socket; pending and later operations fail. Idempotent.
    fn close(&self);
}

/// Factory for listeners, sockets and outbound connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Listen for stream connections on `address`.
    async fn listen(&self, network: &str, address: &str) -> io::Result<Arc<dyn StreamListener>>;

    /// Bind a datagram socket on `address`.
    async fn listen_packet(
        &self,
        network: &str,
        address: &str,
    ) -> io::Result<Arc<dyn PacketSocket>>;

    /// Open an outbound connection to `address`.
    async fn dial(&self, network: &str, address: &str) -> io::Result<BoxConn>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stream_networks() {
        for network in STREAM_NETWORKS {
            assert_eq!(NetworkKind::classify(network), NetworkKind::Stream);
        }
    }

    #[test]
    fn test_classify_everything_else_as_datagram() {
        for network in ["udp", "udp4", "udp6", "unixgram", "ip4:icmp", "", "TCP"] {
            assert_eq!(NetworkKind::classify(network), NetworkKind::Datagram);
        }
        assert!(!NetworkKind::Datagram.is_stream());
        assert_eq!(NetworkKind::Stream.to_string(), "stream");
    }
}
