//! Server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of server counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Stream connections accepted.
    pub connections_accepted: u64,

    /// Virtual connections opened for new datagram peers.
    pub peers_opened: u64,

    /// Virtual connections closed.
    pub peers_closed: u64,

    /// Datagrams received on the shared socket.
    pub datagrams_received: u64,

    /// Datagrams sent back to peers.
    pub datagrams_sent: u64,

    /// Datagram payload bytes received.
    pub bytes_received: u64,

    /// Datagram payload bytes sent.
    pub bytes_sent: u64,

    /// Datagrams dropped because they were empty or their peer was already
    /// closing.
    pub datagrams_dropped: u64,

    /// Transient transport errors that were retried.
    pub transient_errors: u64,
}

/// Inner statistics (atomic counters).
#[derive(Debug, Default)]
pub(crate) struct ServerStatsInner {
    pub(crate) connections_accepted: AtomicU64,
    pub(crate) peers_opened: AtomicU64,
    pub(crate) peers_closed: AtomicU64,
    pub(crate) datagrams_received: AtomicU64,
    pub(crate) datagrams_sent: AtomicU64,
    pub(crate) bytes_received: AtomicU64,
    pub(crate) bytes_sent: AtomicU64,
    pub(crate) datagrams_dropped: AtomicU64,
    pub(crate) transient_errors: AtomicU64,
}

impl ServerStatsInner {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, value: usize) {
        counter.fetch_add(value as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServerStats {
        ServerStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            peers_opened: self.peers_opened.load(Ordering::Relaxed),
            peers_closed: self.peers_closed.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
        }
    }
}
