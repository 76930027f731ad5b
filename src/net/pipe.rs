//! In-memory message pipe used for virtual datagram connections.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// The relay's end of a [`MessagePipe`].
#[derive(Debug)]
pub struct PipeFeed {
    /// Messages sent here are read by the [`MessagePipe`] end.
    pub sender: mpsc::Sender<Bytes>,

    /// Every write on the [`MessagePipe`] end arrives here as one message.
    pub receiver: mpsc::Receiver<Bytes>,
}

/// Create a message pipe holding at most `depth` undelivered messages per
/// direction.
///
/// # Panics
///
/// Panics if `depth` is zero.
#[must_use]
pub fn message_pipe(depth: usize) -> (MessagePipe, PipeFeed) {
    let (inbound_tx, inbound_rx) = mpsc::channel(depth);
    let (outbound_tx, outbound_rx) = mpsc::channel(depth);

    let pipe = MessagePipe {
        rx: inbound_rx,
        tx: PollSender::new(outbound_tx),
        pending: Bytes::new(),
        eof: false,
    };
    let feed = PipeFeed {
        sender: inbound_tx,
        receiver: outbound_rx,
    };
    (pipe, feed)
}

/// A byte-stream end that keeps message boundaries.
///
/// A read returns bytes from a single message; a message longer than the
/// read buffer is finished by the following reads. Each non-empty write is
/// sent as exactly one message and waits while the pipe is full. Reads see
/// end of stream once every [`PipeFeed::sender`] is dropped, and writes fail
/// with `BrokenPipe` once the [`PipeFeed::receiver`] is gone.
pub struct MessagePipe {
    rx: mpsc::Receiver<Bytes>,
    tx: PollSender<Bytes>,
    pending: Bytes,
    eof: bool,
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "message pipe closed")
}

impl AsyncRead for MessagePipe {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pending.is_empty() && !this.eof {
            match ready!(this.rx.poll_recv(cx)) {
                Some(message) => this.pending = message,
                None => this.eof = true,
            }
        }

        let n = buf.remaining().min(this.pending.len());
        buf.put_slice(&this.pending[..n]);
        this.pending.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MessagePipe {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let this = self.get_mut();
        if ready!(this.tx.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(broken_pipe()));
        }
        match this.tx.send_item(Bytes::copy_from_slice(buf)) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(broken_pipe())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().tx.close();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_reads_keep_message_boundaries() {
        let (mut pipe, feed) = message_pipe(4);
        feed.sender.send(Bytes::from_static(b"first")).await.unwrap();
        feed.sender.send(Bytes::from_static(b"second")).await.unwrap();

        let mut buf = [0u8; 64];
        let n = pipe.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = pipe.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[tokio::test]
    async fn test_short_read_finishes_message_before_next() {
        let (mut pipe, feed) = message_pipe(4);
        feed.sender.send(Bytes::from_static(b"abcdef")).await.unwrap();
        feed.sender.send(Bytes::from_static(b"xyz")).await.unwrap();

        let mut buf = [0u8; 4];
        let n = pipe.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abcd");
        let n = pipe.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ef");
        let n = pipe.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"xyz");
    }

    #[tokio::test]
    async fn test_each_write_is_one_message() {
        let (mut pipe, mut feed) = message_pipe(4);
        pipe.write_all(b"reply-one").await.unwrap();
        pipe.write_all(b"reply-two").await.unwrap();

        assert_eq!(&feed.receiver.recv().await.unwrap()[..], b"reply-one");
        assert_eq!(&feed.receiver.recv().await.unwrap()[..], b"reply-two");
    }

    #[tokio::test]
    async fn test_eof_after_senders_dropped() {
        let (mut pipe, feed) = message_pipe(1);
        feed.sender.send(Bytes::from_static(b"last")).await.unwrap();
        drop(feed);

        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"last");
    }

    #[tokio::test]
    async fn test_write_after_receiver_dropped_fails() {
        let (mut pipe, feed) = message_pipe(1);
        drop(feed.receiver);

        let err = pipe.write_all(b"lost").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_shutdown_ends_outbound_stream() {
        let (mut pipe, mut feed) = message_pipe(1);
        pipe.write_all(b"bye").await.unwrap();
        pipe.shutdown().await.unwrap();

        assert_eq!(&feed.receiver.recv().await.unwrap()[..], b"bye");
        assert!(feed.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_pipe_blocks_writer() {
        let (mut pipe, mut feed) = message_pipe(1);
        pipe.write_all(b"one").await.unwrap();

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), pipe.write_all(b"two"))
                .await;
        assert!(blocked.is_err());

        assert_eq!(&feed.receiver.recv().await.unwrap()[..], b"one");
        pipe.write_all(b"two").await.unwrap();
        assert_eq!(&feed.receiver.recv().await.unwrap()[..], b"two");
    }
}
