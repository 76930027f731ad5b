//! Datagram relay: one socket presented as many virtual connections.
//!
//! The dispatch loop owns the socket. The first datagram from a new sender
//! opens an in-memory [`MessagePipe`](crate::net::MessagePipe) for it,
//! registers the relay's sender in the [`PeerTable`], starts a write-back
//! task that sends each handler write to the peer as one datagram, and hands
//! the pipe to the handler dressed up with the socket's and sender's
//! addresses. Every datagram is then delivered to its sender's pipe as one
//! message, in arrival order.
//!
//! A single loop feeds every pipe, so a handler that stops reading stalls
//! delivery to all peers once its pipe is full.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::net::{
    closed_error, is_closed, is_transient, message_pipe, AddrOverride, NetAddr, PacketSocket,
};

use super::handler::HandlerSpawner;
use super::peers::{PeerEntry, PeerTable};
use super::stats::ServerStatsInner;

/// Sizes used by the relay.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RelaySettings {
    /// Receive buffer for one datagram.
    pub(crate) read_buffer_size: usize,

    /// Datagrams queued per virtual connection and direction.
    pub(crate) pipe_depth: usize,
}

/// The dispatch side of the relay.
pub(crate) struct DatagramRelay {
    socket: Arc<dyn PacketSocket>,
    local_addr: NetAddr,
    peers: Arc<PeerTable>,
    spawner: HandlerSpawner,
    tracker: TaskTracker,
    stats: Arc<ServerStatsInner>,
    settings: RelaySettings,
    shutdown: CancellationToken,
}

impl DatagramRelay {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        socket: Arc<dyn PacketSocket>,
        local_addr: NetAddr,
        peers: Arc<PeerTable>,
        spawner: HandlerSpawner,
        tracker: TaskTracker,
        stats: Arc<ServerStatsInner>,
        settings: RelaySettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            socket,
            local_addr,
            peers,
            spawner,
            tracker,
            stats,
            settings,
            shutdown,
        }
    }

    /// Run the dispatch loop until the socket reports a non-transient
    /// error or the relay is shut down, then close every virtual
    /// connection.
    pub(crate) async fn run(self) {
        info!(address = %self.local_addr, "Relay started");

        let mut buf = vec![0u8; self.settings.read_buffer_size];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) if is_transient(&e) => {
                    ServerStatsInner::incr(&self.stats.transient_errors);
                    debug!(error = %e, "Transient receive error");
                    continue;
                },
                Err(e) => {
                    if is_closed(&e) {
                        debug!(error = %e, "Socket closed");
                    } else {
                        error!(error = %e, "Fatal receive error");
                    }
                    break;
                },
            };

            ServerStatsInner::incr(&self.stats.datagrams_received);
            ServerStatsInner::add(&self.stats.bytes_received, len);

            // A zero-length read would look like end of stream to the handler.
            if len == 0 {
                ServerStatsInner::incr(&self.stats.datagrams_dropped);
                debug!(peer = %peer, "Dropped empty datagram");
                continue;
            }

            let key = peer.peer_key();
            let entry = match self.peers.get(&key).await {
                Some(entry) => entry,
                None => self.open(key, peer.clone()).await,
            };

            match self.deliver(&entry, &buf[..len]).await {
                Ok(()) => {},
                Err(_) if self.shutdown.is_cancelled() => break,
                Err(e) if is_closed(&e) => {
                    // The handler is gone; its write-back task retires the entry.
                    ServerStatsInner::incr(&self.stats.datagrams_dropped);
                    entry.closer.cancel();
                    debug!(peer = %peer, "Dropped datagram for closing connection");
                },
                Err(e) => {
                    error!(peer = %peer, error = %e, "Fatal relay write error");
                    break;
                },
            }
        }

        self.teardown().await;
    }

    /// Open a virtual connection for a new peer and start serving it.
    async fn open(&self, key: String, peer: NetAddr) -> PeerEntry {
        let (pipe, feed) = message_pipe(self.settings.pipe_depth);

        let entry = PeerEntry::new(feed.sender, self.shutdown.child_token());
        let inserted = self.peers.insert(key.clone(), entry.clone()).await;
        debug_assert!(inserted, "peer {key} registered twice");

        ServerStatsInner::incr(&self.stats.peers_opened);
        debug!(peer = %peer, "Opened virtual connection");

        let write_back = WriteBack {
            key,
            peer: peer.clone(),
            receiver: feed.receiver,
            closer: entry.closer.clone(),
            socket: Arc::clone(&self.socket),
            peers: Arc::clone(&self.peers),
            stats: Arc::clone(&self.stats),
        };
        self.tracker.spawn(write_back.run());

        let conn = AddrOverride::new(pipe, self.local_addr.clone(), peer);
        self.spawner.spawn(Box::new(conn));

        entry
    }

    /// Hand one datagram to a peer's pipe, waiting while it is full.
    async fn deliver(&self, entry: &PeerEntry, payload: &[u8]) -> io::Result<()> {
        let message = Bytes::copy_from_slice(payload);
        tokio::select! {
            () = entry.closer.cancelled() => Err(closed_error()),
            sent = entry.sender.send(message) => sent.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "virtual connection closed")
            }),
        }
    }

    async fn teardown(&self) {
        self.peers.close_all().await;
        self.shutdown.cancel();
        info!(address = %self.local_addr, "Relay stopped");
    }
}

/// Forwards a handler's writes back to its peer through the shared socket.
struct WriteBack {
    key: String,
    peer: NetAddr,
    receiver: mpsc::Receiver<Bytes>,
    closer: CancellationToken,
    socket: Arc<dyn PacketSocket>,
    peers: Arc<PeerTable>,
    stats: Arc<ServerStatsInner>,
}

impl WriteBack {
    async fn run(mut self) {
        loop {
            let message = tokio::select! {
                () = self.closer.cancelled() => break,
                message = self.receiver.recv() => message,
            };

            // The handler closed its end.
            let Some(payload) = message else {
                break;
            };

            if !self.forward(&payload).await {
                break;
            }
        }

        self.close().await;
    }

    /// Send one handler write to the peer as a single datagram. Returns
    /// `false` if the connection must close.
    async fn forward(&self, payload: &[u8]) -> bool {
        loop {
            let sent = tokio::select! {
                () = self.closer.cancelled() => return false,
                sent = self.socket.send_to(payload, &self.peer) => sent,
            };

            match sent {
                Ok(len) => {
                    ServerStatsInner::incr(&self.stats.datagrams_sent);
                    ServerStatsInner::add(&self.stats.bytes_sent, len);
                    return true;
                },
                Err(e) if is_transient(&e) => {
                    ServerStatsInner::incr(&self.stats.transient_errors);
                    debug!(peer = %self.peer, error = %e, "Transient send error");
                },
                Err(e) => {
                    if !is_closed(&e) {
                        warn!(peer = %self.peer, error = %e, "Failed to send datagram");
                    }
                    return false;
                },
            }
        }
    }

    /// Drop the relay's end of the pipe and retire the peer entry.
    async fn close(self) {
        self.closer.cancel();
        drop(self.receiver);

        if self.peers.remove(&self.key).await.is_some() {
            ServerStatsInner::incr(&self.stats.peers_closed);
        }
        debug!(peer = %self.peer, "Closed virtual connection");
    }
}
