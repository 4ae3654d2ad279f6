//! Operational helpers: logging setup and in-memory event journaling.

use std::sync::Arc;

use tempo_types::{
    config::OpsConfig,
    events::{ClientMessage, Notice, ServerMessage},
    Result, TempoError,
};
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| TempoError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| TempoError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-memory journal of everything that crossed the transport boundary plus
/// the notices shown to the player. Useful for post-match replay and tests.
#[derive(Clone, Default)]
pub struct EventJournal {
    inbound: Arc<Mutex<Vec<ServerMessage>>>,
    outbound: Arc<Mutex<Vec<ClientMessage>>>,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_inbound(&self, message: ServerMessage) {
        self.inbound.lock().await.push(message);
    }

    pub async fn record_outbound(&self, message: ClientMessage) {
        self.outbound.lock().await.push(message);
    }

    pub async fn record_notices(&self, notices: impl IntoIterator<Item = Notice>) {
        self.notices.lock().await.extend(notices);
    }

    pub async fn inbound_snapshot(&self) -> Vec<ServerMessage> {
        self.inbound.lock().await.clone()
    }

    pub async fn outbound_snapshot(&self) -> Vec<ClientMessage> {
        self.outbound.lock().await.clone()
    }

    pub async fn notices_snapshot(&self) -> Vec<Notice> {
        self.notices.lock().await.clone()
    }
}
