//! Per-piece-kind geometric screening, ignoring check, pins, and turn.

use tempo_types::board::{Piece, PieceColor, PieceKind, Position, Square};

/// Decides whether a relocation is geometrically possible for the piece,
/// ignoring check, pin, and turn constraints.
pub fn is_plausible(from: Square, to: Square, piece: Piece, position: &Position) -> bool {
    if from == to {
        return false;
    }
    let df = to.file as i16 - from.file as i16;
    let dr = to.rank as i16 - from.rank as i16;

    match piece.kind {
        PieceKind::Knight => matches!((df.abs(), dr.abs()), (1, 2) | (2, 1)),
        PieceKind::Bishop => df.abs() == dr.abs() && path_clear(position, from, to),
        PieceKind::Rook => (df == 0) != (dr == 0) && path_clear(position, from, to),
        PieceKind::Queen => {
            (df.abs() == dr.abs() || (df == 0) != (dr == 0)) && path_clear(position, from, to)
        }
        PieceKind::King => {
            if df.abs() <= 1 && dr.abs() <= 1 {
                return true;
            }
            castle_shape(position, from, df, dr, piece.color)
        }
        PieceKind::Pawn => pawn_shape(position, from, to, df, dr, piece.color),
    }
}

/// All intervening squares between `from` and `to` (exclusive) are empty.
/// Callers guarantee the two squares share a rank, file, or diagonal.
fn path_clear(position: &Position, from: Square, to: Square) -> bool {
    let step_f = (to.file as i16 - from.file as i16).signum() as i8;
    let step_r = (to.rank as i16 - from.rank as i16).signum() as i8;

    let mut cursor = from;
    loop {
        cursor = match cursor.offset(step_f, step_r) {
            Some(next) => next,
            None => return false,
        };
        if cursor == to {
            return true;
        }
        if !position.is_empty_square(cursor) {
            return false;
        }
    }
}

/// Castling *shape*: a two-file king slide with a same-color rook still on
/// the home corner of that wing. Whether the king has moved or passes
/// through attack is left to the rules oracle at execution time.
fn castle_shape(position: &Position, from: Square, df: i16, dr: i16, color: PieceColor) -> bool {
    if dr != 0 || df.abs() != 2 || from.rank != color.back_rank() {
        return false;
    }
    let rook_file = if df > 0 { Position::BOARD_SIZE - 1 } else { 0 };
    position
        .piece_at(Square::new(rook_file, from.rank))
        .map(|p| p.color == color && p.kind == PieceKind::Rook)
        .unwrap_or(false)
}

fn pawn_shape(
    position: &Position,
    from: Square,
    to: Square,
    df: i16,
    dr: i16,
    color: PieceColor,
) -> bool {
    let dir = color.pawn_direction() as i16;

    if df == 0 {
        if dr == dir {
            return position.is_empty_square(to);
        }
        if dr == 2 * dir && from.rank == color.pawn_start_rank() {
            let intermediate = match from.offset(0, dir as i8) {
                Some(square) => square,
                None => return false,
            };
            return position.is_empty_square(intermediate) && position.is_empty_square(to);
        }
        return false;
    }

    if df.abs() == 1 && dr == dir {
        return match position.piece_at(to) {
            Some(target) => target.color != color,
            // Permissive en-passant screening: an empty square on the
            // opponent's en-passant-eligible rank passes; the drain gate
            // rejects it if the preceding move never qualified.
            None => to.rank == color.en_passant_capture_rank(),
        };
    }

    false
}
