//! Client connection and receive loop.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWriteExt, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::net::{BoxConn, TokioTransport, Transport};

use super::error::{ClientError, ClientResult};

/// Callback invoked with every decoded token.
pub type ReceiveFn = Arc<dyn Fn(Bytes) + Send + Sync>;

#[derive(Default)]
struct ClientState {
    started: bool,
    pending: Option<BoxConn>,
    writer: Option<WriteHalf<BoxConn>>,
    closer: Option<CancellationToken>,
    receiver: Option<JoinHandle<()>>,
}

/// A connection to a server with a background receive loop.
pub struct Client<D> {
    network: String,
    address: String,
    decoder: D,
    on_receive: ReceiveFn,
    transport: Arc<dyn Transport>,
    state: Mutex<ClientState>,
}

impl<D> Client<D>
where
    D: Decoder + Clone + Send + 'static,
    D::Item: Into<Bytes> + Send,
    D::Error: Display + Send,
{
    /// Create a client for `network` and `address`.
    ///
    /// Nothing is dialed until [`start`](Self::start).
    pub fn new(
        network: impl Into<String>,
        address: impl Into<String>,
        decoder: D,
        on_receive: impl Fn(Bytes) + Send + Sync + 'static,
    ) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
            decoder,
            on_receive: Arc::new(on_receive),
            transport: Arc::new(TokioTransport::new()),
            state: Mutex::new(ClientState::default()),
        }
    }

    /// Create a client over an established connection.
    ///
    /// The first [`start`](Self::start) uses `conn` instead of dialing.
    pub fn with_conn(
        conn: BoxConn,
        decoder: D,
        on_receive: impl Fn(Bytes) + Send + Sync + 'static,
    ) -> Self {
        let address = conn
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        let mut client = Self::new("", address, decoder, on_receive);
        client.state.get_mut().pending = Some(conn);
        client
    }

    /// Dial through `transport` instead of [`TokioTransport`].
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Open the connection and start the receive loop.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AlreadyStarted` if started and
    /// `ClientError::Dial` if the connection cannot be opened.
    pub async fn start(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        if state.started {
            return Err(ClientError::AlreadyStarted);
        }

        let conn = match state.pending.take() {
            Some(conn) => conn,
            None => self
                .transport
                .dial(&self.network, &self.address)
                .await
                .map_err(|source| ClientError::Dial {
                    network: self.network.clone(),
                    address: self.address.clone(),
                    source,
                })?,
        };

        let (reader, writer) = tokio::io::split(conn);
        let closer = CancellationToken::new();
        let frames = FramedRead::new(reader, self.decoder.clone());
        let receiver = tokio::spawn(receive_loop(
            frames,
            Arc::clone(&self.on_receive),
            closer.clone(),
        ));

        state.writer = Some(writer);
        state.closer = Some(closer);
        state.receiver = Some(receiver);
        state.started = true;

        debug!(network = %self.network, address = %self.address, "Client started");
        Ok(())
    }

    /// Write all of `data` to the connection.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotStarted` if not started and
    /// `ClientError::Send` if the write fails.
    pub async fn send(&self, data: &[u8]) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        if !state.started {
            return Err(ClientError::NotStarted);
        }
        let Some(writer) = state.writer.as_mut() else {
            return Err(ClientError::NotStarted);
        };

        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the connection and wait for the receive loop to exit.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotStarted` if not started.
    pub async fn stop(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        if !state.started {
            return Err(ClientError::NotStarted);
        }

        if let Some(closer) = state.closer.take() {
            closer.cancel();
        }
        if let Some(mut writer) = state.writer.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(receiver) = state.receiver.take() {
            if let Err(e) = receiver.await {
                warn!(error = %e, "Receive loop panicked");
            }
        }

        state.started = false;
        debug!(network = %self.network, address = %self.address, "Client stopped");
        Ok(())
    }

    /// Returns `true` while started.
    pub async fn is_started(&self) -> bool {
        self.state.lock().await.started
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
}

async fn receive_loop<R, D>(
    mut frames: FramedRead<R, D>,
    on_receive: ReceiveFn,
    closer: CancellationToken,
) where
    R: AsyncRead + Unpin,
    D: Decoder,
    D::Item: Into<Bytes>,
    D::Error: Display,
{
    loop {
        let next = tokio::select! {
            () = closer.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(token)) => on_receive(token.into()),
            Some(Err(e)) => {
                debug!(error = %e, "Receive loop ended on decode error");
                break;
            },
            None => break,
        }
    }
}
