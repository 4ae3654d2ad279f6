use serde::{Deserialize, Serialize};

use crate::board::{PieceColor, PieceKind, Position, Square};

/// An executed or submitted relocation. Promotion carries the chosen kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceKind) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }
}

/// One row of a rules-oracle legal-move enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMove {
    pub mv: Move,
    pub is_promotion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl MatchResult {
    pub fn win_for(color: PieceColor) -> Self {
        match color {
            PieceColor::White => MatchResult::WhiteWins,
            PieceColor::Black => MatchResult::BlackWins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Checkmate,
    Timeout,
    Resignation,
    DrawAgreement,
    DrawByRule,
    Abandonment,
}

/// Coarse match lifecycle. Terminal once completed: no further moves or
/// clock ticks are accepted afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    Active,
    Completed {
        reason: EndReason,
        result: MatchResult,
    },
}

impl MatchState {
    pub fn is_active(&self) -> bool {
        matches!(self, MatchState::Active)
    }
}

/// Rating adjustments reported with an authoritative game end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    pub white: i32,
    pub black: i32,
}

/// One confirmed half-move plus the position it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub ply: u32,
    pub by: PieceColor,
    pub mv: Move,
    pub position: Position,
}

/// Append-only record of executed moves with a read cursor for review.
///
/// The cursor indexes half-moves: 0 is the position the match was joined at,
/// `len()` is the live position. Navigation never mutates the records; the
/// position at every index was captured when the move was confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveHistory {
    base: Position,
    records: Vec<MoveRecord>,
    cursor: usize,
}

impl MoveHistory {
    pub fn new(base: Position) -> Self {
        Self {
            base,
            records: Vec::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    /// Whether the cursor sits at the live (most recent) position.
    pub fn is_live(&self) -> bool {
        self.cursor == self.records.len()
    }

    /// Appends a confirmed move. A cursor parked at the live index follows
    /// the append; a cursor reviewing the past stays where it is.
    pub fn append(&mut self, record: MoveRecord) {
        let was_live = self.is_live();
        self.records.push(record);
        if was_live {
            self.cursor = self.records.len();
        }
    }

    pub fn to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn to_live(&mut self) {
        self.cursor = self.records.len();
    }

    pub fn back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn forward(&mut self) {
        if self.cursor < self.records.len() {
            self.cursor += 1;
        }
    }

    pub fn jump(&mut self, index: usize) -> bool {
        if index <= self.records.len() {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Position under the read cursor; never the live position unless the
    /// cursor is at the live index.
    pub fn position_at_cursor(&self) -> &Position {
        if self.cursor == 0 {
            &self.base
        } else {
            &self.records[self.cursor - 1].position
        }
    }
}
