//! Peer table for the datagram relay.
//!
//! Maps a peer key (the sender address as a string) to the relay's end of
//! that peer's virtual connection. The dispatch loop is the only inserter;
//! each entry is removed only by its own write-back task.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// The relay's handle on one virtual connection.
#[derive(Clone)]
pub(crate) struct PeerEntry {
    /// Datagram payloads for the handler, one message each.
    pub(crate) sender: mpsc::Sender<Bytes>,

    /// Cancelled when the virtual connection is closing.
    pub(crate) closer: CancellationToken,
}

impl PeerEntry {
    pub(crate) fn new(sender: mpsc::Sender<Bytes>, closer: CancellationToken) -> Self {
        Self { sender, closer }
    }
}

/// Active virtual connections keyed by peer.
#[derive(Default)]
pub(crate) struct PeerTable {
    peers: RwLock<HashMap<String, PeerEntry>>,
}

impl PeerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new peer. Returns `false` and leaves the table unchanged
    /// if the key is already present.
    pub(crate) async fn insert(&self, key: String, entry: PeerEntry) -> bool {
        let mut peers = self.peers.write().await;
        if peers.contains_key(&key) {
            return false;
        }
        peers.insert(key, entry);
        true
    }

    pub(crate) async fn get(&self, key: &str) -> Option<PeerEntry> {
        self.peers.read().await.get(key).cloned()
    }

    pub(crate) async fn remove(&self, key: &str) -> Option<PeerEntry> {
        self.peers.write().await.remove(key)
    }

    /// Signal every registered virtual connection to close. Entries stay
    /// until their write-back tasks remove them.
    pub(crate) async fn close_all(&self) {
        for entry in self.peers.read().await.values() {
            entry.closer.cancel();
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.peers.read().await.len()
    }
}
