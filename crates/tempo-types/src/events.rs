use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::PieceColor;
use crate::clock::ClockSnapshot;
use crate::game::{EndReason, MatchResult, MatchState, Move, RatingDeltas};

/// Notifications delivered by the authoritative server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Initial sync on connect.
    Joined {
        /// Encoded board string for the current authoritative position.
        position: String,
        state: MatchState,
        clock: ClockSnapshot,
        /// Which side this client plays.
        player: PieceColor,
    },
    OpponentMoved {
        mv: Move,
    },
    ClockSync(ClockSnapshot),
    MatchOver {
        reason: EndReason,
        result: MatchResult,
        rating_deltas: Option<RatingDeltas>,
    },
    Resigned {
        by: PieceColor,
        rating_deltas: Option<RatingDeltas>,
    },
    DrawOffered,
    DrawAccepted,
    DrawDeclined,
    DrawWithdrawn,
    /// Forward-compatible escape hatch for payloads this client predates.
    Unknown(serde_json::Value),
}

/// Actions this client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientCommand {
    SubmitMove { mv: Move },
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    WithdrawDrawOffer,
}

/// Immutable inbound envelope for logging and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: ServerEvent,
}

impl ServerMessage {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Immutable outbound envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub command: ClientCommand,
}

impl ClientMessage {
    pub fn new(command: ClientCommand) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            command,
        }
    }
}

/// Why a premove was refused at enqueue time. Local only, no network effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PremoveRejection {
    EmptySource,
    NotYourPiece,
    OwnPieceCapture,
    Implausible,
}

/// Why queued premoves were discarded after having been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PremoveCancelCause {
    /// The head's source piece was captured while queued.
    SourceCaptured,
    /// The head failed exact-match legality against the new position.
    Invalidated,
    /// The match ended or the user cancelled.
    Cleared,
}

/// Lightweight non-blocking notices surfaced to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    PremoveRejected(PremoveRejection),
    PremovesCancelled {
        cause: PremoveCancelCause,
        dropped: usize,
    },
    PromotionChoiceRequired,
    TransportFailure(String),
    LocalTimeout {
        flagged: PieceColor,
    },
    TimeoutReverted,
    DrawOfferReceived,
    DrawOfferAccepted,
    DrawOfferDeclined,
    DrawOfferWithdrawn,
}
