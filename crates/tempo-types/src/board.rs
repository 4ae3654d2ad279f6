use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, TempoError};

/// Represents the two players in a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceColor {
    White,
    Black,
}

impl PieceColor {
    pub fn opponent(self) -> Self {
        match self {
            PieceColor::White => PieceColor::Black,
            PieceColor::Black => PieceColor::White,
        }
    }

    /// Rank the side's pawns start on (0-indexed).
    pub fn pawn_start_rank(self) -> u8 {
        match self {
            PieceColor::White => 1,
            PieceColor::Black => 6,
        }
    }

    /// Rank a pawn of this color promotes on (0-indexed).
    pub fn promotion_rank(self) -> u8 {
        match self {
            PieceColor::White => 7,
            PieceColor::Black => 0,
        }
    }

    /// Rank this side's pawn captures land on when taking en passant.
    pub fn en_passant_capture_rank(self) -> u8 {
        match self {
            PieceColor::White => 5,
            PieceColor::Black => 2,
        }
    }

    /// Forward direction along ranks for this side's pawns.
    pub fn pawn_direction(self) -> i8 {
        match self {
            PieceColor::White => 1,
            PieceColor::Black => -1,
        }
    }

    pub fn back_rank(self) -> u8 {
        match self {
            PieceColor::White => 0,
            PieceColor::Black => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// Lightweight board coordinate (0-indexed, a1 = file 0, rank 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Self {
        Self { file, rank }
    }

    pub fn offset(&self, df: i8, dr: i8) -> Option<Square> {
        let nf = self.file as i16 + df as i16;
        let nr = self.rank as i16 + dr as i16;
        if nf >= 0 && nr >= 0 && nf < Position::BOARD_SIZE as i16 && nr < Position::BOARD_SIZE as i16
        {
            Some(Square::new(nf as u8, nr as u8))
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file) as char,
            (b'1' + self.rank) as char
        )
    }
}

impl FromStr for Square {
    type Err = TempoError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(TempoError::Codec(format!("invalid square '{s}'")));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        if file >= Position::BOARD_SIZE || rank >= Position::BOARD_SIZE {
            return Err(TempoError::Codec(format!("square '{s}' out of bounds")));
        }
        Ok(Square::new(file, rank))
    }
}

/// Piece with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: PieceColor,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(color: PieceColor, kind: PieceKind) -> Self {
        Self { color, kind }
    }
}

/// A piece resolved at a concrete square. Never owns a position; always the
/// result of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceRef {
    pub square: Square,
    pub piece: Piece,
}

/// Per-wing castling availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub fn all() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    pub fn none() -> Self {
        Self {
            white_king_side: false,
            white_queen_side: false,
            black_king_side: false,
            black_queen_side: false,
        }
    }
}

/// Canonical board position: piece placement plus the non-placement metadata
/// that travels with it. Treated as immutable by every component; mutations
/// go through the codec or the rules oracle, which return a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pieces: Vec<Option<Piece>>,
    pub side_to_move: PieceColor,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Position {
    pub const BOARD_SIZE: u8 = 8;

    pub fn empty() -> Self {
        Self {
            pieces: vec![None; (Self::BOARD_SIZE as usize) * (Self::BOARD_SIZE as usize)],
            side_to_move: PieceColor::White,
            castling: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn initial() -> Self {
        let mut position = Self::empty();
        position.castling = CastlingRights::all();
        position.setup_initial_placement();
        position
    }

    pub fn index(&self, square: Square) -> Option<usize> {
        if square.file < Self::BOARD_SIZE && square.rank < Self::BOARD_SIZE {
            Some((square.rank as usize) * (Self::BOARD_SIZE as usize) + square.file as usize)
        } else {
            None
        }
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.index(square)
            .and_then(|idx| self.pieces.get(idx).copied().flatten())
    }

    pub fn set_piece(&mut self, square: Square, piece: Option<Piece>) -> bool {
        if let Some(idx) = self.index(square) {
            if let Some(slot) = self.pieces.get_mut(idx) {
                *slot = piece;
                return true;
            }
        }
        false
    }

    pub fn is_empty_square(&self, square: Square) -> bool {
        self.piece_at(square).is_none()
    }

    pub fn find_king(&self, color: PieceColor) -> Option<Square> {
        for rank in 0..Self::BOARD_SIZE {
            for file in 0..Self::BOARD_SIZE {
                let square = Square::new(file, rank);
                if self.piece_at(square) == Some(Piece::new(color, PieceKind::King)) {
                    return Some(square);
                }
            }
        }
        None
    }

    fn setup_initial_placement(&mut self) {
        use PieceKind::*;

        let back_rank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        for (file, kind) in back_rank.iter().enumerate() {
            self.set_piece(
                Square::new(file as u8, 0),
                Some(Piece::new(PieceColor::White, *kind)),
            );
            self.set_piece(
                Square::new(file as u8, Self::BOARD_SIZE - 1),
                Some(Piece::new(PieceColor::Black, *kind)),
            );
        }

        for file in 0..Self::BOARD_SIZE {
            self.set_piece(
                Square::new(file, 1),
                Some(Piece::new(PieceColor::White, Pawn)),
            );
            self.set_piece(
                Square::new(file, Self::BOARD_SIZE - 2),
                Some(Piece::new(PieceColor::Black, Pawn)),
            );
        }
    }
}
