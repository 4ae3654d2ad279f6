//! The rules-oracle boundary: authoritative legality, injected at the seam.

use tempo_types::{
    board::{Position, Square},
    game::{LegalMove, Move},
    Result, TempoError,
};

/// Terminal verdict for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    None,
    Checkmate,
    Stalemate,
    Draw,
}

/// Trusted, synchronous, side-effect-free legality capability.
///
/// The oracle is stateless: every call takes the position it operates on, so
/// no component ever shares a mutable rules instance.
pub trait RulesOracle: Send + Sync {
    /// Enumerates fully legal moves, optionally restricted to one source
    /// square. Castling is reported as the king's two-file destination.
    fn legal_moves(&self, position: &Position, from: Option<Square>) -> Result<Vec<LegalMove>>;

    /// Applies a legal move, producing the next authoritative position.
    /// An illegal move is an error, never a panic.
    fn apply(&self, position: &Position, mv: &Move) -> Result<Position>;

    /// Whether the side to move is in check.
    fn in_check(&self, position: &Position) -> Result<bool>;

    fn terminal(&self, position: &Position) -> Result<Terminal>;
}

pub fn rules_error(message: impl Into<String>) -> TempoError {
    TempoError::Rules(message.into())
}
