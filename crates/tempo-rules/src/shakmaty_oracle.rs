//! Rules oracle backed by `shakmaty`, consumed through the codec boundary:
//! positions cross into the library as board strings and come back the same
//! way, so no shakmaty state ever outlives a single call.

use shakmaty::{
    fen::Fen, CastlingMode, Chess, EnPassantMode, File, Move as ShakMove,
    Position as ShakPosition, Rank, Role, Square as ShakSquare,
};
use tempo_types::{
    board::{PieceKind, Position, Square},
    game::{LegalMove, Move},
    Result,
};

use crate::oracle::{rules_error, RulesOracle, Terminal};

#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyOracle;

impl ShakmatyOracle {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, position: &Position) -> Result<Chess> {
        let encoded = tempo_codec::encode(position);
        let fen: Fen = encoded
            .parse()
            .map_err(|err| rules_error(format!("unreadable board string '{encoded}': {err}")))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|err| rules_error(format!("rejected position '{encoded}': {err}")))
    }
}

fn to_shak_square(square: Square) -> ShakSquare {
    ShakSquare::from_coords(File::new(square.file as u32), Rank::new(square.rank as u32))
}

fn from_shak_square(square: ShakSquare) -> Square {
    Square::new(u32::from(square.file()) as u8, u32::from(square.rank()) as u8)
}

fn role_to_kind(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn kind_to_role(kind: PieceKind) -> Role {
    match kind {
        PieceKind::Pawn => Role::Pawn,
        PieceKind::Knight => Role::Knight,
        PieceKind::Bishop => Role::Bishop,
        PieceKind::Rook => Role::Rook,
        PieceKind::Queen => Role::Queen,
        PieceKind::King => Role::King,
    }
}

/// Coordinates of a shakmaty move in the client convention: castling is the
/// king's two-file destination, not the rook square.
fn normalized(mv: &ShakMove) -> Option<(ShakSquare, ShakSquare, Option<Role>)> {
    match mv {
        ShakMove::Normal {
            from, to, promotion, ..
        } => Some((*from, *to, *promotion)),
        ShakMove::EnPassant { from, to } => Some((*from, *to, None)),
        ShakMove::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            Some((*king, ShakSquare::from_coords(file, king.rank()), None))
        }
        ShakMove::Put { .. } => None,
    }
}

impl RulesOracle for ShakmatyOracle {
    fn legal_moves(&self, position: &Position, from: Option<Square>) -> Result<Vec<LegalMove>> {
        let chess = self.load(position)?;
        let filter = from.map(to_shak_square);

        let mut rows = Vec::new();
        for candidate in chess.legal_moves().iter() {
            let Some((m_from, m_to, promotion)) = normalized(candidate) else {
                continue;
            };
            if filter.map(|f| f != m_from).unwrap_or(false) {
                continue;
            }
            rows.push(LegalMove {
                mv: Move {
                    from: from_shak_square(m_from),
                    to: from_shak_square(m_to),
                    promotion: promotion.map(role_to_kind),
                },
                is_promotion: promotion.is_some(),
            });
        }
        Ok(rows)
    }

    fn apply(&self, position: &Position, mv: &Move) -> Result<Position> {
        let chess = self.load(position)?;
        let from = to_shak_square(mv.from);
        let to = to_shak_square(mv.to);
        let promotion = mv.promotion.map(kind_to_role);

        let candidate = chess
            .legal_moves()
            .iter()
            .find(|m| {
                normalized(m)
                    .map(|(f, t, p)| f == from && t == to && p == promotion)
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| rules_error(format!("move {}{} is not legal here", mv.from, mv.to)))?;

        let next = chess
            .play(candidate)
            .map_err(|err| rules_error(format!("apply failed: {err}")))?;
        let encoded = Fen::from_position(&next, EnPassantMode::Legal).to_string();
        tempo_codec::decode(&encoded)
    }

    fn in_check(&self, position: &Position) -> Result<bool> {
        Ok(self.load(position)?.is_check())
    }

    fn terminal(&self, position: &Position) -> Result<Terminal> {
        let chess = self.load(position)?;
        if chess.is_checkmate() {
            Ok(Terminal::Checkmate)
        } else if chess.is_stalemate() {
            Ok(Terminal::Stalemate)
        } else if chess.is_insufficient_material() || chess.halfmoves() >= 100 {
            Ok(Terminal::Draw)
        } else {
            Ok(Terminal::None)
        }
    }
}
