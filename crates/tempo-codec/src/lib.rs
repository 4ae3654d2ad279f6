//! Board-string codec: compact textual position layout plus the pure
//! relocation primitive used for speculative preview composition.
//!
//! The codec performs no legality checking. Applying a relocation never
//! flips side-to-move and preserves every non-placement field verbatim,
//! because a premove is not a real move.

use tempo_types::{
    board::{CastlingRights, Piece, PieceColor, PieceKind, Position, Square},
    Result, TempoError,
};

pub fn codec_error(message: impl Into<String>) -> TempoError {
    TempoError::Codec(message.into())
}

fn piece_to_char(piece: Piece) -> char {
    let c = match piece.kind {
        PieceKind::Pawn => 'p',
        PieceKind::Knight => 'n',
        PieceKind::Bishop => 'b',
        PieceKind::Rook => 'r',
        PieceKind::Queen => 'q',
        PieceKind::King => 'k',
    };
    match piece.color {
        PieceColor::White => c.to_ascii_uppercase(),
        PieceColor::Black => c,
    }
}

fn piece_from_char(c: char) -> Option<Piece> {
    let kind = match c.to_ascii_lowercase() {
        'p' => PieceKind::Pawn,
        'n' => PieceKind::Knight,
        'b' => PieceKind::Bishop,
        'r' => PieceKind::Rook,
        'q' => PieceKind::Queen,
        'k' => PieceKind::King,
        _ => return None,
    };
    let color = if c.is_ascii_uppercase() {
        PieceColor::White
    } else {
        PieceColor::Black
    };
    Some(Piece::new(color, kind))
}

/// Encodes a position into its board string (FEN layout).
pub fn encode(position: &Position) -> String {
    let mut placement = String::new();
    for rank in (0..Position::BOARD_SIZE).rev() {
        let mut empty_run = 0;
        for file in 0..Position::BOARD_SIZE {
            match position.piece_at(Square::new(file, rank)) {
                Some(piece) => {
                    if empty_run > 0 {
                        placement.push_str(&empty_run.to_string());
                        empty_run = 0;
                    }
                    placement.push(piece_to_char(piece));
                }
                None => empty_run += 1,
            }
        }
        if empty_run > 0 {
            placement.push_str(&empty_run.to_string());
        }
        if rank > 0 {
            placement.push('/');
        }
    }

    let side = match position.side_to_move {
        PieceColor::White => 'w',
        PieceColor::Black => 'b',
    };

    let mut castling = String::new();
    if position.castling.white_king_side {
        castling.push('K');
    }
    if position.castling.white_queen_side {
        castling.push('Q');
    }
    if position.castling.black_king_side {
        castling.push('k');
    }
    if position.castling.black_queen_side {
        castling.push('q');
    }
    if castling.is_empty() {
        castling.push('-');
    }

    let en_passant = position
        .en_passant
        .map(|sq| sq.to_string())
        .unwrap_or_else(|| "-".into());

    format!(
        "{placement} {side} {castling} {en_passant} {} {}",
        position.halfmove_clock, position.fullmove_number
    )
}

/// Decodes a board string produced by [`encode`] (or any standard FEN).
pub fn decode(text: &str) -> Result<Position> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(codec_error(format!(
            "expected 6 board-string fields, found {}",
            fields.len()
        )));
    }

    let mut position = Position::empty();

    let ranks: Vec<&str> = fields[0].split('/').collect();
    if ranks.len() != Position::BOARD_SIZE as usize {
        return Err(codec_error(format!(
            "expected {} ranks in placement, found {}",
            Position::BOARD_SIZE,
            ranks.len()
        )));
    }
    for (row, rank_text) in ranks.iter().enumerate() {
        let rank = Position::BOARD_SIZE - 1 - row as u8;
        let mut file = 0u8;
        for c in rank_text.chars() {
            if let Some(run) = c.to_digit(10) {
                file = file.saturating_add(run as u8);
            } else {
                let piece = piece_from_char(c)
                    .ok_or_else(|| codec_error(format!("unknown piece letter '{c}'")))?;
                if file >= Position::BOARD_SIZE {
                    return Err(codec_error(format!("rank '{rank_text}' overflows the board")));
                }
                position.set_piece(Square::new(file, rank), Some(piece));
                file += 1;
            }
        }
        if file != Position::BOARD_SIZE {
            return Err(codec_error(format!(
                "rank '{rank_text}' describes {file} files, expected {}",
                Position::BOARD_SIZE
            )));
        }
    }

    position.side_to_move = match fields[1] {
        "w" => PieceColor::White,
        "b" => PieceColor::Black,
        other => return Err(codec_error(format!("invalid side-to-move '{other}'"))),
    };

    let mut castling = CastlingRights::none();
    if fields[2] != "-" {
        for c in fields[2].chars() {
            match c {
                'K' => castling.white_king_side = true,
                'Q' => castling.white_queen_side = true,
                'k' => castling.black_king_side = true,
                'q' => castling.black_queen_side = true,
                other => {
                    return Err(codec_error(format!("invalid castling flag '{other}'")));
                }
            }
        }
    }
    position.castling = castling;

    position.en_passant = match fields[3] {
        "-" => None,
        square => Some(square.parse()?),
    };

    position.halfmove_clock = fields[4]
        .parse()
        .map_err(|err| codec_error(format!("invalid half-move clock: {err}")))?;
    position.fullmove_number = fields[5]
        .parse()
        .map_err(|err| codec_error(format!("invalid full-move number: {err}")))?;

    Ok(position)
}

/// Applies a single piece relocation without legality checking.
///
/// Returns `None` only when `from` holds no piece. The destination is
/// overwritten (captures fall out naturally); a promotion hint replaces the
/// kind of the placed piece. Side-to-move and all other metadata are
/// preserved verbatim.
pub fn apply(
    position: &Position,
    from: Square,
    to: Square,
    piece_hint: Piece,
    promotion: Option<PieceKind>,
) -> Option<Position> {
    position.piece_at(from)?;

    let placed = match promotion {
        Some(kind) => Piece::new(piece_hint.color, kind),
        None => piece_hint,
    };

    let mut next = position.clone();
    next.set_piece(from, None);
    next.set_piece(to, Some(placed));
    Some(next)
}
