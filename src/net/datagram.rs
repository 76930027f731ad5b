//! Connected UDP socket adapted to the byte-stream contract.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::UdpSocket;

use super::addr::NetAddr;
use super::conn::Conn;

/// A connected UDP socket presented as a [`Conn`].
///
/// Each write is sent as one datagram and each read returns at most one
/// datagram. Reads into a buffer shorter than the datagram truncate it.
#[derive(Debug)]
pub struct DatagramConn {
    socket: UdpSocket,
    local: NetAddr,
    remote: NetAddr,
}

impl DatagramConn {
    /// Wrap a socket that has already been `connect`ed to its peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is not connected.
    pub fn new(socket: UdpSocket) -> io::Result<Self> {
        let local = NetAddr::from(socket.local_addr()?);
        let remote = NetAddr::from(socket.peer_addr()?);
        Ok(Self {
            socket,
            local,
            remote,
        })
    }
}

impl AsyncRead for DatagramConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

impl AsyncWrite for DatagramConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.socket.poll_send(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Conn for DatagramConn {
    fn local_addr(&self) -> io::Result<NetAddr> {
        Ok(self.local.clone())
    }

    fn remote_addr(&self) -> io::Result<NetAddr> {
        Ok(self.remote.clone())
    }
}
