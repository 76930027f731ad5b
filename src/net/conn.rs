//! The duplex connection contract handed to handlers.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use super::addr::NetAddr;

/// A full-duplex byte stream with known endpoints.
///
/// Closing is done by dropping the connection or calling
/// [`AsyncWriteExt::shutdown`](tokio::io::AsyncWriteExt::shutdown).
pub trait Conn: AsyncRead + AsyncWrite + Send + Unpin {
    /// Address of the local end.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying socket cannot report it.
    fn local_addr(&self) -> io::Result<NetAddr>;

    /// Address of the remote end.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying socket cannot report it.
    fn remote_addr(&self) -> io::Result<NetAddr>;
}

/// A boxed connection, the unit delivered to handlers.
pub type BoxConn = Box<dyn Conn>;

impl Conn for TcpStream {
    fn local_addr(&self) -> io::Result<NetAddr> {
        TcpStream::local_addr(self).map(NetAddr::from)
    }

    fn remote_addr(&self) -> io::Result<NetAddr> {
        TcpStream::peer_addr(self).map(NetAddr::from)
    }
}

#[cfg(unix)]
impl Conn for tokio::net::UnixStream {
    fn local_addr(&self) -> io::Result<NetAddr> {
        tokio::net::UnixStream::local_addr(self).map(NetAddr::from)
    }

    fn remote_addr(&self) -> io::Result<NetAddr> {
        tokio::net::UnixStream::peer_addr(self).map(NetAddr::from)
    }
}

/// Decorator that reports fixed local/remote addresses.
///
/// Reads, writes, flushes and shutdowns go straight to the wrapped stream.
/// The datagram relay uses it to dress an in-memory pipe up as a peer
/// connection.
#[derive(Debug)]
pub struct AddrOverride<T> {
    inner: T,
    local: NetAddr,
    remote: NetAddr,
}

impl<T> AddrOverride<T> {
    /// Wrap `inner` so it reports `local` and `remote` as its endpoints.
    #[must_use]
    pub fn new(inner: T, local: NetAddr, remote: NetAddr) -> Self {
        Self {
            inner,
            local,
            remote,
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for AddrOverride<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for AddrOverride<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

impl<T> Conn for AddrOverride<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    fn local_addr(&self) -> io::Result<NetAddr> {
        Ok(self.local.clone())
    }

    fn remote_addr(&self) -> io::Result<NetAddr> {
        Ok(self.remote.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn addr(s: &str) -> NetAddr {
        NetAddr::from(s.parse::<SocketAddr>().unwrap())
    }

    #[tokio::test]
    async fn test_override_reports_given_addresses() {
        let (_other, pipe) = tokio::io::duplex(64);
        let conn = AddrOverride::new(pipe, addr("10.0.0.1:53"), addr("10.0.0.2:4000"));

        assert_eq!(conn.local_addr().unwrap(), addr("10.0.0.1:53"));
        assert_eq!(conn.remote_addr().unwrap(), addr("10.0.0.2:4000"));
    }

    #[tokio::test]
    async fn test_override_delegates_io() {
        let (mut other, pipe) = tokio::io::duplex(64);
        let mut conn: BoxConn = Box::new(AddrOverride::new(
            pipe,
            addr("10.0.0.1:53"),
            addr("10.0.0.2:4000"),
        ));

        conn.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        other.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        other.write_all(b"pong").await.unwrap();
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Shutdown propagates as EOF on the other end.
        conn.shutdown().await.unwrap();
        assert_eq!(other.read(&mut buf).await.unwrap(), 0);
    }
}
