//! Server lifecycle.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::net::{NetAddr, NetworkKind, PacketSocket, StreamListener, TokioTransport, Transport};

use super::error::{ServerError, ServerResult};
use super::handler::{ConnectionHandler, HandlerSpawner};
use super::peers::PeerTable;
use super::relay::{DatagramRelay, RelaySettings};
use super::stats::{ServerStats, ServerStatsInner};
use super::stream::StreamAcceptLoop;

/// State guarded by the lifecycle mutex.
#[derive(Default)]
struct Lifecycle {
    started: bool,
    stopping: bool,
    listener: Option<Arc<dyn StreamListener>>,
    socket: Option<Arc<dyn PacketSocket>>,
    relay_shutdown: Option<CancellationToken>,
}

/// A server that hands every connection, stream or datagram, to one
/// handler.
///
/// Stream networks (`tcp`, `tcp4`, `tcp6`, `unix`, `unixpacket`) are served
/// by an accept loop. Every other network is served by a datagram relay that
/// gives each sender its own virtual connection.
pub struct Server {
    network: String,
    address: String,
    kind: NetworkKind,
    spawner: HandlerSpawner,
    transport: Arc<dyn Transport>,
    settings: RelaySettings,
    peers: Arc<PeerTable>,
    tracker: TaskTracker,
    stats: Arc<ServerStatsInner>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Server {
    /// Create a server with default tuning on the tokio transport.
    ///
    /// The network and address are not checked until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Never fails for a supplied handler; the `Result` matches
    /// [`ServerBuilder::build`].
    pub fn new(
        network: impl Into<String>,
        address: impl Into<String>,
        handler: impl ConnectionHandler,
    ) -> ServerResult<Self> {
        Self::builder(network, address).handler(handler).build()
    }

    /// Start building a server for `network` and `address`.
    #[must_use]
    pub fn builder(network: impl Into<String>, address: impl Into<String>) -> ServerBuilder {
        ServerBuilder::from_config(ServerConfig::new(network, address))
    }

    /// Bind the listener or socket and launch the serving loop.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::AlreadyStarted` if the server is running and
    /// `ServerError::Bind` if the transport cannot bind the address.
    pub async fn start(&self) -> ServerResult<()> {
        let mut state = self.lifecycle.lock().await;
        if state.started {
            return Err(ServerError::AlreadyStarted);
        }

        let spawner = self.spawner.clone();
        let stats = Arc::clone(&self.stats);
        let lifecycle = Arc::clone(&self.lifecycle);

        let local_addr = if self.kind.is_stream() {
            let listener = self
                .transport
                .listen(&self.network, &self.address)
                .await
                .map_err(|source| self.bind_error(source))?;
            let local_addr = listener.local_addr().ok();

            state.listener = Some(Arc::clone(&listener));

            let accept = StreamAcceptLoop::new(listener, spawner, stats);
            self.tracker.spawn(async move {
                accept.run().await;
                lifecycle.lock().await.listener = None;
            });

            local_addr
        } else {
            let socket = self
                .transport
                .listen_packet(&self.network, &self.address)
                .await
                .map_err(|source| self.bind_error(source))?;
            let local_addr = match socket.local_addr() {
                Ok(addr) => addr,
                Err(source) => {
                    socket.close();
                    return Err(self.bind_error(source));
                },
            };

            let shutdown = CancellationToken::new();
            state.socket = Some(Arc::clone(&socket));
            state.relay_shutdown = Some(shutdown.clone());

            let relay = DatagramRelay::new(
                socket,
                local_addr.clone(),
                Arc::clone(&self.peers),
                spawner,
                self.tracker.clone(),
                stats,
                self.settings,
                shutdown,
            );
            self.tracker.spawn(async move {
                relay.run().await;
                let mut state = lifecycle.lock().await;
                state.socket = None;
                state.relay_shutdown = None;
            });

            Some(local_addr)
        };

        state.started = true;

        let bound = local_addr.map(|addr| addr.to_string()).unwrap_or_default();
        info!(
            network = %self.network,
            address = %self.address,
            kind = %self.kind,
            local_addr = %bound,
            "Server started"
        );
        Ok(())
    }

    /// Close the listener or socket and wait for the serving loop and every
    /// write-back task to finish.
    ///
    /// Handler tasks are not waited on. They observe their connection
    /// closing and are expected to return.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::NotStarted` if the server is not running.
    pub async fn stop(&self) -> ServerResult<()> {
        {
            let mut state = self.lifecycle.lock().await;
            if !state.started || state.stopping {
                return Err(ServerError::NotStarted);
            }
            state.stopping = true;

            if let Some(listener) = &state.listener {
                listener.close();
            }
            if let Some(socket) = &state.socket {
                socket.close();
            }
            if let Some(shutdown) = &state.relay_shutdown {
                shutdown.cancel();
            }
        }

        // The loops take the lifecycle lock on exit, so it is not held here.
        debug!(tasks = self.tracker.len(), "Waiting for server tasks");
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();

        let mut state = self.lifecycle.lock().await;
        state.listener = None;
        state.socket = None;
        state.relay_shutdown = None;
        state.stopping = false;
        state.started = false;

        info!(network = %self.network, address = %self.address, "Server stopped");
        Ok(())
    }

    /// Returns `true` between a successful `start` and the end of `stop`.
    pub async fn is_started(&self) -> bool {
        self.lifecycle.lock().await.started
    }

    /// The bound address, while a listener or socket is held.
    pub async fn local_addr(&self) -> Option<NetAddr> {
        let state = self.lifecycle.lock().await;
        if let Some(listener) = &state.listener {
            return listener.local_addr().ok();
        }
        if let Some(socket) = &state.socket {
            return socket.local_addr().ok();
        }
        None
    }

    /// Number of live virtual connections. Always zero for stream networks.
    pub async fn peer_count(&self) -> usize {
        self.peers.len().await
    }

    /// Snapshot of the server counters.
    #[must_use]
    pub fn stats(&self) -> ServerStats {
        self.stats.snapshot()
    }

    /// The configured network name.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The configured address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the network is served as a stream or through the relay.
    #[must_use]
    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    fn bind_error(&self, source: std::io::Error) -> ServerError {
        ServerError::Bind {
            network: self.network.clone(),
            address: self.address.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    handler: Option<Arc<dyn ConnectionHandler>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ServerBuilder {
    /// Start from a loaded [`ServerConfig`], including its network and
    /// address.
    #[must_use]
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            handler: None,
            transport: None,
        }
    }

    /// Set the connection handler. Required.
    #[must_use]
    pub fn handler(mut self, handler: impl ConnectionHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Use a shared handler.
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn ConnectionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind through `transport` instead of [`TokioTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the datagram receive buffer size.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set how many datagrams each virtual connection queues per direction.
    #[must_use]
    pub fn pipe_depth(mut self, depth: usize) -> Self {
        self.config.pipe_depth = depth;
        self
    }

    /// Cap the number of concurrently running handlers.
    #[must_use]
    pub fn max_concurrent_handlers(mut self, max: usize) -> Self {
        self.config.max_concurrent_handlers = Some(max);
        self
    }

    /// Build the server.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if no handler was set or the tuning
    /// values are invalid.
    pub fn build(self) -> ServerResult<Server> {
        let handler = self.handler.ok_or_else(|| ServerError::Config {
            message: "handler is required".to_string(),
        })?;

        self.config.validate().map_err(|e| ServerError::Config {
            message: e.to_string(),
        })?;

        let ServerConfig {
            network,
            address,
            read_buffer_size,
            pipe_depth,
            max_concurrent_handlers,
        } = self.config;

        let kind = NetworkKind::classify(&network);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TokioTransport::new()));

        Ok(Server {
            network,
            address,
            kind,
            spawner: HandlerSpawner::new(handler, max_concurrent_handlers),
            transport,
            settings: RelaySettings {
                read_buffer_size,
                pipe_depth,
            },
            peers: Arc::new(PeerTable::new()),
            tracker: TaskTracker::new(),
            stats: Arc::new(ServerStatsInner::default()),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        })
    }
}
