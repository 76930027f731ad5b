//! Accept loop for stream transports.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::net::{is_closed, is_transient, StreamListener};

use super::handler::HandlerSpawner;
use super::stats::ServerStatsInner;

/// Accepts connections and hands each to the handler on its own task.
pub(crate) struct StreamAcceptLoop {
    listener: Arc<dyn StreamListener>,
    spawner: HandlerSpawner,
    stats: Arc<ServerStatsInner>,
}

impl StreamAcceptLoop {
    pub(crate) fn new(
        listener: Arc<dyn StreamListener>,
        spawner: HandlerSpawner,
        stats: Arc<ServerStatsInner>,
    ) -> Self {
        Self {
            listener,
            spawner,
            stats,
        }
    }

    /// Run until the listener reports a non-transient error.
    pub(crate) async fn run(self) {
        let address = self
            .listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        info!(address = %address, "Accept loop started");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    ServerStatsInner::incr(&self.stats.connections_accepted);
                    if let Ok(peer) = conn.remote_addr() {
                        debug!(peer = %peer, "Accepted connection");
                    }
                    self.spawner.spawn(conn);
                },
                Err(e) if is_transient(&e) => {
                    ServerStatsInner::incr(&self.stats.transient_errors);
                    debug!(error = %e, "Transient accept error");
                },
                Err(e) => {
                    if is_closed(&e) {
                        debug!(error = %e, "Listener closed");
                    } else {
                        warn!(error = %e, "Fatal accept error");
                    }
                    break;
                },
            }
        }

        info!(address = %address, "Accept loop stopped");
    }
}
