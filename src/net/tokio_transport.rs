//! Tokio-backed socket capability.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::addr::{closed_error, NetAddr};
use super::conn::BoxConn;
use super::datagram::DatagramConn;
use super::transport::{PacketSocket, StreamListener, Transport};

/// Address family restriction implied by a network name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    fn of(network: &str) -> Self {
        match network {
            "tcp4" | "udp4" => Self::V4,
            "tcp6" | "udp6" => Self::V6,
            _ => Self::Any,
        }
    }

    fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

/// Resolve `address` for `network`.
///
/// An empty host (`":8080"`, or an empty address meaning port 0) binds to
/// the unspecified address, or dials loopback.
async fn resolve(network: &str, address: &str, dial: bool) -> io::Result<SocketAddr> {
    let family = Family::of(network);
    let address = if address.is_empty() { ":0" } else { address };

    let candidate = match address.strip_prefix(':') {
        Some(port) => {
            let host = match (family, dial) {
                (Family::V6, false) => "[::]",
                (Family::V6, true) => "[::1]",
                (_, false) => "0.0.0.0",
                (_, true) => "127.0.0.1",
            };
            format!("{host}:{port}")
        },
        None => address.to_string(),
    };

    let found = tokio::net::lookup_host(candidate)
        .await?
        .find(|addr| family.admits(addr));
    found.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no suitable address found for {network} {address}"),
        )
    })
}

fn unsupported(network: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("unsupported network '{network}'"),
    )
}

/// Sockets from the tokio runtime.
///
/// Supports `tcp`, `tcp4`, `tcp6` and `unix` listeners, `udp`, `udp4`,
/// `udp6` and `unixgram` sockets, and dialing `tcp*`, `unix` and `udp*`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTransport;

impl TokioTransport {
    /// Create a new tokio transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TokioTransport {
    async fn listen(&self, network: &str, address: &str) -> io::Result<Arc<dyn StreamListener>> {
        let inner = match network {
            "tcp" | "tcp4" | "tcp6" => {
                let addr = resolve(network, address, false).await?;
                ListenerInner::Tcp(TcpListener::bind(addr).await?)
            },
            #[cfg(unix)]
            "unix" => ListenerInner::Unix(tokio::net::UnixListener::bind(address)?),
            _ => return Err(unsupported(network)),
        };

        let listener = TokioListener {
            inner,
            closed: CancellationToken::new(),
        };
        info!(network, address = %listener.local_addr()?, "Stream listener bound");
        Ok(Arc::new(listener))
    }

    async fn listen_packet(
        &self,
        network: &str,
        address: &str,
    ) -> io::Result<Arc<dyn PacketSocket>> {
        let inner = match network {
            "udp" | "udp4" | "udp6" => {
                let addr = resolve(network, address, false).await?;
                PacketInner::Udp(UdpSocket::bind(addr).await?)
            },
            #[cfg(unix)]
            "unixgram" => PacketInner::Unix(tokio::net::UnixDatagram::bind(address)?),
            _ => return Err(unsupported(network)),
        };

        let socket = TokioPacketSocket {
            inner,
            closed: CancellationToken::new(),
        };
        info!(network, address = %socket.local_addr()?, "Datagram socket bound");
        Ok(Arc::new(socket))
    }

    async fn dial(&self, network: &str, address: &str) -> io::Result<BoxConn> {
        match network {
            "tcp" | "tcp4" | "tcp6" => {
                let addr = resolve(network, address, true).await?;
                let stream = TcpStream::connect(addr).await?;
                debug!(peer = %addr, "Dialed stream connection");
                Ok(Box::new(stream))
            },
            #[cfg(unix)]
            "unix" => Ok(Box::new(tokio::net::UnixStream::connect(address).await?)),
            "udp" | "udp4" | "udp6" => {
                let addr = resolve(network, address, true).await?;
                let local = if addr.is_ipv4() {
                    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
                } else {
                    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
                };
                let socket = UdpSocket::bind(local).await?;
                socket.connect(addr).await?;
                debug!(peer = %addr, "Dialed datagram connection");
                Ok(Box::new(DatagramConn::new(socket)?))
            },
            _ => Err(unsupported(network)),
        }
    }
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
}

/// A tokio stream listener that can be closed from another task.
pub struct TokioListener {
    inner: ListenerInner,
    closed: CancellationToken,
}

impl TokioListener {
    async fn accept_inner(&self) -> io::Result<BoxConn> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            },
            #[cfg(unix)]
            ListenerInner::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            },
        }
    }
}

#[async_trait]
impl StreamListener for TokioListener {
    async fn accept(&self) -> io::Result<BoxConn> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            accepted = self.accept_inner() => accepted,
        }
    }

    fn local_addr(&self) -> io::Result<NetAddr> {
        match &self.inner {
            ListenerInner::Tcp(listener) => listener.local_addr().map(NetAddr::from),
            #[cfg(unix)]
            ListenerInner::Unix(listener) => listener.local_addr().map(NetAddr::from),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

/// Unix sockets own their socket file; remove it once the socket is gone.
#[cfg(unix)]
fn remove_socket_file(addr: io::Result<tokio::net::unix::SocketAddr>) {
    if let Some(path) = addr
        .ok()
        .and_then(|addr| addr.as_pathname().map(std::path::Path::to_path_buf))
    {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(unix)]
impl Drop for TokioListener {
    fn drop(&mut self) {
        if let ListenerInner::Unix(listener) = &self.inner {
            remove_socket_file(listener.local_addr());
        }
    }
}

enum PacketInner {
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(tokio::net::UnixDatagram),
}

/// A tokio datagram socket that can be closed from another task.
pub struct TokioPacketSocket {
    inner: PacketInner,
    closed: CancellationToken,
}

impl TokioPacketSocket {
    async fn recv_inner(&self, buf: &mut [u8]) -> io::Result<(usize, NetAddr)> {
        match &self.inner {
            PacketInner::Udp(socket) => {
                let (n, addr) = socket.recv_from(buf).await?;
                Ok((n, NetAddr::from(addr)))
            },
            #[cfg(unix)]
            PacketInner::Unix(socket) => {
                let (n, addr) = socket.recv_from(buf).await?;
                Ok((n, NetAddr::from(addr)))
            },
        }
    }

    async fn send_inner(&self, buf: &[u8], target: &NetAddr) -> io::Result<usize> {
        match (&self.inner, target) {
            (PacketInner::Udp(socket), NetAddr::Inet(addr)) => socket.send_to(buf, addr).await,
            #[cfg(unix)]
            (PacketInner::Unix(socket), NetAddr::Unix(Some(path))) => {
                socket.send_to(buf, path).await
            },
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot send to address '{target}' on this socket"),
            )),
        }
    }
}

#[async_trait]
impl PacketSocket for TokioPacketSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, NetAddr)> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            received = self.recv_inner(buf) => received,
        }
    }

    async fn send_to(&self, buf: &[u8], target: &NetAddr) -> io::Result<usize> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            sent = self.send_inner(buf, target) => sent,
        }
    }

    fn local_addr(&self) -> io::Result<NetAddr> {
        match &self.inner {
            PacketInner::Udp(socket) => socket.local_addr().map(NetAddr::from),
            #[cfg(unix)]
            PacketInner::Unix(socket) => socket.local_addr().map(NetAddr::from),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

#[cfg(unix)]
impl Drop for TokioPacketSocket {
    fn drop(&mut self) {
        if let PacketInner::Unix(socket) = &self.inner {
            remove_socket_file(socket.local_addr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::is_closed;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolve_empty_host() {
        let addr = resolve("tcp4", ":0", false).await.unwrap();
        assert!(addr.ip().is_unspecified());
        assert!(addr.is_ipv4());

        let addr = resolve("udp", "", true).await.unwrap();
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_resolve_family_mismatch() {
        let result = resolve("tcp6", "127.0.0.1:0", false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_network() {
        let transport = TokioTransport::new();
        let err = transport.listen("sctp", "127.0.0.1:0").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let err = transport
            .listen_packet("ip4:icmp", "127.0.0.1")
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_accept() {
        let listener = TokioTransport::new()
            .listen("tcp", "127.0.0.1:0")
            .await
            .unwrap();

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await.err() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        listener.close();

        let err = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(is_closed(&err));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_recv() {
        let socket = TokioTransport::new()
            .listen_packet("udp", "127.0.0.1:0")
            .await
            .unwrap();

        let pending = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                let mut buf = [0u8; 16];
                socket.recv_from(&mut buf).await.err()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        socket.close();

        let err = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(is_closed(&err));

        let send = socket.send_to(b"late", &socket.local_addr().unwrap()).await;
        assert!(send.is_err());
    }

    #[tokio::test]
    async fn test_packet_socket_round_trip() {
        let transport = TokioTransport::new();
        let a = transport.listen_packet("udp4", "127.0.0.1:0").await.unwrap();
        let b = transport.listen_packet("udp4", "127.0.0.1:0").await.unwrap();

        let b_addr = b.local_addr().unwrap();
        a.send_to(b"hello", &b_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
