//! Transport adapter: the bidirectional event channel to the authoritative
//! server, treated as an abstract message bus rather than a concrete
//! protocol implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use tempo_types::{
    events::{ClientMessage, ServerMessage},
    Result, TempoError,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

pub fn transport_error(message: impl Into<String>) -> TempoError {
    TempoError::Transport(message.into())
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits a client command. Failures surface to the caller; the core
    /// never retries silently.
    async fn send(&self, message: ClientMessage) -> Result<()>;

    /// Subscribes to the single ordered inbound stream. Delivery order
    /// within the stream is preserved.
    fn incoming(&self) -> BoxStream<'static, ServerMessage>;
}

/// In-process transport backed by broadcast channels: the client side sends
/// commands and consumes server events, while a [`ServerHandle`] lets tests
/// and demos play the authoritative server.
#[derive(Clone)]
pub struct LocalTransport {
    inbound_tx: broadcast::Sender<ServerMessage>,
    outbound_tx: broadcast::Sender<ClientMessage>,
}

impl LocalTransport {
    pub fn new(capacity: usize) -> (Self, ServerHandle) {
        let (inbound_tx, _) = broadcast::channel(capacity);
        let (outbound_tx, outbound_keepalive) = broadcast::channel(capacity);
        let transport = Self {
            inbound_tx: inbound_tx.clone(),
            outbound_tx: outbound_tx.clone(),
        };
        // The keepalive receiver pins the outbound channel open for the
        // lifetime of the server handle, so sends only fail once the
        // server side is truly gone.
        let handle = ServerHandle {
            inbound_tx,
            outbound_tx,
            _outbound_keepalive: Arc::new(outbound_keepalive),
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, message: ClientMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .map(|_| ())
            .map_err(|_| transport_error("server side of local transport is gone"))
    }

    fn incoming(&self) -> BoxStream<'static, ServerMessage> {
        let mut rx = BroadcastStream::new(self.inbound_tx.subscribe());
        // Lagging behind the channel is logged and skipped, never fatal.
        Box::pin(async_stream::stream! {
            while let Some(item) = rx.next().await {
                match item {
                    Ok(message) => yield message,
                    Err(err) => warn!("inbound subscriber lagged: {err}"),
                }
            }
            info!("inbound transport stream closed");
        })
    }
}

/// The authoritative side of a [`LocalTransport`] pair.
#[derive(Clone)]
pub struct ServerHandle {
    inbound_tx: broadcast::Sender<ServerMessage>,
    outbound_tx: broadcast::Sender<ClientMessage>,
    _outbound_keepalive: Arc<broadcast::Receiver<ClientMessage>>,
}

impl ServerHandle {
    /// Emits a server event toward the client. Returns how many subscribers
    /// observed it.
    pub fn emit(&self, message: ServerMessage) -> usize {
        self.inbound_tx.send(message).unwrap_or(0)
    }

    /// Observes the client's outbound commands.
    pub fn outbound(&self) -> BoxStream<'static, ClientMessage> {
        BroadcastStream::new(self.outbound_tx.subscribe())
            .filter_map(|item| async move { item.ok() })
            .boxed()
    }
}
