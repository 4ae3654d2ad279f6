use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::PieceColor;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TimeControlMode {
    Bullet,
    Blitz,
    Rapid,
    Classic,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeControl {
    pub mode: TimeControlMode,
    pub base_ms: u64,
    pub increment_ms: u64,
}

impl TimeControl {
    pub fn blitz() -> Self {
        Self {
            mode: TimeControlMode::Blitz,
            base_ms: 5 * 60 * 1000,
            increment_ms: 0,
        }
    }

    pub fn rapid() -> Self {
        Self {
            mode: TimeControlMode::Rapid,
            base_ms: 10 * 60 * 1000,
            increment_ms: 5_000,
        }
    }
}

/// Authoritative, timestamped statement of both players' remaining time.
/// Superseded wholesale by the next snapshot, never merged field-by-field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_ms: u64,
    pub black_ms: u64,
    pub increment_ms: u64,
    pub active: PieceColor,
    pub issued_at: DateTime<Utc>,
}

/// Display values derived from the latest snapshot plus elapsed wall time.
/// Never persisted; never the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockView {
    pub white_ms: u64,
    pub black_ms: u64,
    pub active: PieceColor,
}

impl ClockView {
    pub fn remaining(&self, side: PieceColor) -> u64 {
        match side {
            PieceColor::White => self.white_ms,
            PieceColor::Black => self.black_ms,
        }
    }
}
