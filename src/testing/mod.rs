//! # Test Doubles
//!
//! Scripted implementations of the [`Transport`] capability. Tests queue
//! the listeners, sockets, connections and errors a transport should hand
//! out, feed inbound traffic, and observe what the code under test sent and
//! closed.
//!
//! Queued items are always delivered before a close is observed, so a test
//! can push a final error and then stop the server deterministically.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::net::{
    closed_error, AddrOverride, BoxConn, NetAddr, PacketSocket, StreamListener, Transport,
};

/// Create a connected pair of in-memory connections.
///
/// The second connection reports `local`/`remote` as given; the first
/// reports them swapped.
#[must_use]
pub fn pipe_conn(local: NetAddr, remote: NetAddr) -> (BoxConn, BoxConn) {
    let (near, far) = tokio::io::duplex(64 * 1024);
    let client = AddrOverride::new(near, remote.clone(), local.clone());
    let server = AddrOverride::new(far, local, remote);
    (Box::new(client), Box::new(server))
}

fn nothing_queued(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no mock {what} queued"))
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
}

fn push<T>(queue: &Mutex<VecDeque<T>>, item: T) {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(item);
}

/// A transport that hands out queued listeners, sockets and connections
/// in order.
#[derive(Default)]
pub struct MockTransport {
    listeners: Mutex<VecDeque<io::Result<MockListener>>>,
    sockets: Mutex<VecDeque<io::Result<MockPacketSocket>>>,
    conns: Mutex<VecDeque<io::Result<BoxConn>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    /// Create a transport with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a listener for the next `listen` call.
    pub fn push_listener(&self, listener: MockListener) {
        push(&self.listeners, Ok(listener));
    }

    /// Make the next `listen` call fail.
    pub fn push_listen_error(&self, error: io::Error) {
        push(&self.listeners, Err(error));
    }

    /// Queue a socket for the next `listen_packet` call.
    pub fn push_socket(&self, socket: MockPacketSocket) {
        push(&self.sockets, Ok(socket));
    }

    /// Make the next `listen_packet` call fail.
    pub fn push_socket_error(&self, error: io::Error) {
        push(&self.sockets, Err(error));
    }

    /// Queue a connection for the next `dial` call.
    pub fn push_conn(&self, conn: BoxConn) {
        push(&self.conns, Ok(conn));
    }

    /// Make the next `dial` call fail.
    pub fn push_dial_error(&self, error: io::Error) {
        push(&self.conns, Err(error));
    }

    /// Every `(network, address)` the transport was asked for, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, network: &str, address: &str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((network.to_string(), address.to_string()));
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn listen(&self, network: &str, address: &str) -> io::Result<Arc<dyn StreamListener>> {
        self.record(network, address);
        let listener = pop(&self.listeners).unwrap_or_else(|| Err(nothing_queued("listener")))?;
        Ok(Arc::new(listener))
    }

    async fn listen_packet(
        &self,
        network: &str,
        address: &str,
    ) -> io::Result<Arc<dyn PacketSocket>> {
        self.record(network, address);
        let socket = pop(&self.sockets).unwrap_or_else(|| Err(nothing_queued("socket")))?;
        Ok(Arc::new(socket))
    }

    async fn dial(&self, network: &str, address: &str) -> io::Result<BoxConn> {
        self.record(network, address);
        pop(&self.conns).unwrap_or_else(|| Err(nothing_queued("connection")))
    }
}

struct ListenerInner {
    local: NetAddr,
    tx: mpsc::UnboundedSender<io::Result<BoxConn>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<io::Result<BoxConn>>>,
    closed: CancellationToken,
    close_count: AtomicUsize,
}

/// A listener whose `accept` returns queued connections and errors.
///
/// Clones share state, so a test can keep one while the server owns
/// another.
#[derive(Clone)]
pub struct MockListener {
    inner: Arc<ListenerInner>,
}

impl MockListener {
    /// Create a listener that reports `local` as its address.
    #[must_use]
    pub fn new(local: NetAddr) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ListenerInner {
                local,
                tx,
                rx: tokio::sync::Mutex::new(rx),
                closed: CancellationToken::new(),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a connection for `accept`.
    pub fn push_conn(&self, conn: BoxConn) {
        let _ = self.inner.tx.send(Ok(conn));
    }

    /// Queue an error for `accept`.
    pub fn push_error(&self, error: io::Error) {
        let _ = self.inner.tx.send(Err(error));
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.close_count.load(Ordering::SeqCst)
    }

    /// Returns `true` once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

#[async_trait]
impl StreamListener for MockListener {
    async fn accept(&self) -> io::Result<BoxConn> {
        let mut rx = self.inner.rx.lock().await;
        tokio::select! {
            biased;
            Some(next) = rx.recv() => next,
            () = self.inner.closed.cancelled() => Err(closed_error()),
        }
    }

    fn local_addr(&self) -> io::Result<NetAddr> {
        Ok(self.inner.local.clone())
    }

    fn close(&self) {
        self.inner.close_count.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.cancel();
    }
}

type Datagram = (Bytes, NetAddr);

struct SocketInner {
    local: NetAddr,
    inbound_tx: mpsc::UnboundedSender<io::Result<Datagram>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<io::Result<Datagram>>>,
    sent_tx: mpsc::UnboundedSender<Datagram>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    send_errors: Mutex<VecDeque<io::Error>>,
    closed: CancellationToken,
}

/// A datagram socket fed by the test.
///
/// `recv_from` returns datagrams and errors queued with
/// [`push_datagram`](Self::push_datagram) and [`push_error`](Self::push_error);
/// everything passed to `send_to` can be read back with
/// [`next_sent`](Self::next_sent). Clones share state.
#[derive(Clone)]
pub struct MockPacketSocket {
    inner: Arc<SocketInner>,
}

impl MockPacketSocket {
    /// Create a socket that reports `local` as its address.
    #[must_use]
    pub fn new(local: NetAddr) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SocketInner {
                local,
                inbound_tx,
                inbound_rx: tokio::sync::Mutex::new(inbound_rx),
                sent_tx,
                sent_rx: tokio::sync::Mutex::new(sent_rx),
                send_errors: Mutex::new(VecDeque::new()),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Deliver a datagram from `from`.
    pub fn push_datagram(&self, payload: Bytes, from: NetAddr) {
        let _ = self.inner.inbound_tx.send(Ok((payload, from)));
    }

    /// Make a later `recv_from` fail.
    pub fn push_error(&self, error: io::Error) {
        let _ = self.inner.inbound_tx.send(Err(error));
    }

    /// Make the next `send_to` fail.
    pub fn push_send_error(&self, error: io::Error) {
        push(&self.inner.send_errors, error);
    }

    /// Wait for the next datagram passed to `send_to`.
    ///
    /// Returns `None` if nothing arrives within two seconds.
    pub async fn next_sent(&self) -> Option<Datagram> {
        let mut rx = self.inner.sent_rx.lock().await;
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Returns `true` once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

#[async_trait]
impl PacketSocket for MockPacketSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, NetAddr)> {
        let mut rx = self.inner.inbound_rx.lock().await;
        let next = tokio::select! {
            biased;
            Some(next) = rx.recv() => next,
            () = self.inner.closed.cancelled() => Err(closed_error()),
        };

        let (payload, from) = next?;
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((len, from))
    }

    async fn send_to(&self, buf: &[u8], target: &NetAddr) -> io::Result<usize> {
        if self.inner.closed.is_cancelled() {
            return Err(closed_error());
        }
        if let Some(error) = pop(&self.inner.send_errors) {
            return Err(error);
        }
        let _ = self
            .inner
            .sent_tx
            .send((Bytes::copy_from_slice(buf), target.clone()));
        Ok(buf.len())
    }

    fn local_addr(&self) -> io::Result<NetAddr> {
        Ok(self.inner.local.clone())
    }

    fn close(&self) {
        self.inner.closed.cancel();
    }
}
