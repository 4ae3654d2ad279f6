//! Speculative premove queue: screening at enqueue time, wholesale preview
//! composition, and head-only draining against authoritative positions.
//!
//! The queue is never trusted on its own: the preview is always recomputed
//! by replaying the queue, in order, over the last authoritative position.

use std::collections::VecDeque;

use tempo_rules::{is_plausible, RulesOracle};
use tempo_types::{
    board::{Piece, PieceColor, PieceKind, Position, Square},
    events::PremoveRejection,
    game::Move,
    Result,
};
use tracing::{debug, info};

/// A speculative, not-yet-legal-to-execute relocation. Created client-side
/// only; never transmitted until it becomes a real move at drain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Premove {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub promotion: Option<PieceKind>,
    /// Promotion choice still owed by the user. Entries in the queue always
    /// carry `false`; only the parked pending premove is awaiting.
    pub awaiting_promotion: bool,
}

impl Premove {
    fn as_move(&self) -> Move {
        Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Pawn reached the last rank: a promotion choice is required before
    /// anything is appended or previewed.
    AwaitingPromotion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// Nothing queued.
    Idle,
    /// The head's source piece was gone; head discarded, no execution.
    HeadCancelled { cancelled: Premove },
    /// The head matched a legal move and was executed.
    Executed { mv: Move, position: Position },
    /// The head failed exact-match legality; the whole queue was discarded.
    Invalidated { dropped: usize },
}

/// Ordered FIFO queue of speculative moves plus the pending-promotion
/// sub-state. Turn gating lives in the session; the manager only owns the
/// queue semantics.
#[derive(Debug, Default)]
pub struct PremoveManager {
    queue: VecDeque<Premove>,
    pending_promotion: Option<Premove>,
}

impl PremoveManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn has_pending_promotion(&self) -> bool {
        self.pending_promotion.is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Premove> {
        self.queue.iter()
    }

    /// Screens and appends a premove. All checks run against the composed
    /// preview so chained premoves validate against where the pieces will be.
    pub fn enqueue(
        &mut self,
        authoritative: &Position,
        from: Square,
        to: Square,
        player: PieceColor,
    ) -> Result<EnqueueOutcome, PremoveRejection> {
        let preview = self.preview(authoritative);

        let piece = preview
            .piece_at(from)
            .ok_or(PremoveRejection::EmptySource)?;
        if piece.color != player {
            return Err(PremoveRejection::NotYourPiece);
        }
        if preview
            .piece_at(to)
            .map(|target| target.color == player)
            .unwrap_or(false)
        {
            return Err(PremoveRejection::OwnPieceCapture);
        }
        if !is_plausible(from, to, piece, &preview) {
            return Err(PremoveRejection::Implausible);
        }

        if piece.kind == PieceKind::Pawn && to.rank == player.promotion_rank() {
            // Not a queue entry yet: the preview must not show a piece on
            // the last rank until the user disambiguates.
            self.pending_promotion = Some(Premove {
                from,
                to,
                piece,
                promotion: None,
                awaiting_promotion: true,
            });
            debug!(%from, %to, "premove parked awaiting promotion choice");
            return Ok(EnqueueOutcome::AwaitingPromotion);
        }

        self.queue.push_back(Premove {
            from,
            to,
            piece,
            promotion: None,
            awaiting_promotion: false,
        });
        debug!(%from, %to, queued = self.queue.len(), "premove queued");
        Ok(EnqueueOutcome::Queued)
    }

    /// Completes the parked pending promotion with the chosen piece kind.
    /// Returns false when nothing was pending.
    pub fn choose_promotion(&mut self, kind: PieceKind) -> bool {
        match self.pending_promotion.take() {
            Some(pending) => {
                self.queue.push_back(Premove {
                    promotion: Some(kind),
                    awaiting_promotion: false,
                    ..pending
                });
                true
            }
            None => false,
        }
    }

    pub fn cancel_pending_promotion(&mut self) -> bool {
        self.pending_promotion.take().is_some()
    }

    /// Composes the preview position by replaying the queue, in order, over
    /// the authoritative position. Recomputed wholesale on every use; never
    /// patched incrementally. An empty queue yields the authoritative
    /// position exactly.
    pub fn preview(&self, authoritative: &Position) -> Position {
        let mut composed = authoritative.clone();
        for entry in &self.queue {
            match tempo_codec::apply(&composed, entry.from, entry.to, entry.piece, entry.promotion)
            {
                Some(next) => composed = next,
                None => {
                    // Stale against a fresh authoritative position; the next
                    // drain settles the queue's fate.
                    debug!(from = %entry.from, "preview replay stopped at empty source");
                    break;
                }
            }
        }
        composed
    }

    /// Attempts to execute the queue head against a new authoritative
    /// position. At most one entry executes per call, strictly in enqueue
    /// order. The oracle's exact-match enumeration is the final gate.
    pub fn drain(
        &mut self,
        authoritative: &Position,
        oracle: &dyn RulesOracle,
    ) -> Result<DrainOutcome> {
        let head = match self.queue.front().copied() {
            Some(head) => head,
            None => return Ok(DrainOutcome::Idle),
        };

        if authoritative.piece_at(head.from) != Some(head.piece) {
            self.queue.pop_front();
            info!(from = %head.from, to = %head.to, "premove cancelled: source piece gone");
            return Ok(DrainOutcome::HeadCancelled { cancelled: head });
        }

        let legal = oracle.legal_moves(authoritative, Some(head.from))?;
        let exact = legal
            .iter()
            .find(|row| row.mv.to == head.to && row.mv.promotion == head.promotion);

        match exact {
            Some(row) => {
                let position = oracle.apply(authoritative, &row.mv)?;
                self.queue.pop_front();
                info!(from = %head.from, to = %head.to, "premove executed");
                Ok(DrainOutcome::Executed {
                    mv: head.as_move(),
                    position,
                })
            }
            None => {
                // A premove invalidated by the opponent's actual move is not
                // retried piecemeal.
                let dropped = self.queue.len();
                self.queue.clear();
                info!(dropped, "premove queue invalidated");
                Ok(DrainOutcome::Invalidated { dropped })
            }
        }
    }

    /// Puts a drained entry back at the head of the queue. Used when the
    /// executed move could not be submitted, so the speculative state stays
    /// intact for a user-initiated retry or cancellation.
    pub fn restore_head(&mut self, premove: Premove) {
        self.queue.push_front(premove);
    }

    /// Drops the queue and any pending promotion. Returns how many queue
    /// entries were discarded.
    pub fn clear(&mut self) -> usize {
        self.pending_promotion = None;
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_codec::decode;
    use tempo_rules::ShakmatyOracle;
    use tempo_types::board::PieceColor;

    fn sq(text: &str) -> Square {
        text.parse().expect("square")
    }

    // White premoves are screened while it is black's move throughout.
    fn initial_black_to_move() -> Position {
        decode("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1").expect("decode")
    }

    #[test]
    fn enqueue_rejects_preconditions() {
        let mut manager = PremoveManager::new();
        let position = initial_black_to_move();

        assert_eq!(
            manager.enqueue(&position, sq("e4"), sq("e5"), PieceColor::White),
            Err(PremoveRejection::EmptySource)
        );
        assert_eq!(
            manager.enqueue(&position, sq("e7"), sq("e5"), PieceColor::White),
            Err(PremoveRejection::NotYourPiece)
        );
        assert_eq!(
            manager.enqueue(&position, sq("d1"), sq("d2"), PieceColor::White),
            Err(PremoveRejection::OwnPieceCapture)
        );
        assert_eq!(
            manager.enqueue(&position, sq("e2"), sq("e5"), PieceColor::White),
            Err(PremoveRejection::Implausible)
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn chained_premoves_screen_against_preview() {
        let mut manager = PremoveManager::new();
        let position = initial_black_to_move();

        assert_eq!(
            manager.enqueue(&position, sq("e2"), sq("e4"), PieceColor::White),
            Ok(EnqueueOutcome::Queued)
        );
        // Legal only because the preview already shows the pawn on e4.
        assert_eq!(
            manager.enqueue(&position, sq("e4"), sq("e5"), PieceColor::White),
            Ok(EnqueueOutcome::Queued)
        );
        assert_eq!(manager.len(), 2);

        let preview = manager.preview(&position);
        assert!(preview.piece_at(sq("e5")).is_some());
        assert!(preview.is_empty_square(sq("e2")));
        assert!(preview.is_empty_square(sq("e4")));
        // A premove is not a real move: turn and metadata untouched.
        assert_eq!(preview.side_to_move, position.side_to_move);

        // The permuted order is rejected outright: replay is order-dependent.
        let mut permuted = PremoveManager::new();
        assert_eq!(
            permuted.enqueue(&position, sq("e4"), sq("e5"), PieceColor::White),
            Err(PremoveRejection::EmptySource)
        );
    }

    #[test]
    fn empty_queue_preview_is_identity() {
        let manager = PremoveManager::new();
        let position = initial_black_to_move();
        assert_eq!(manager.preview(&position), position);
    }

    #[test]
    fn pawn_to_last_rank_parks_promotion_choice() {
        let mut manager = PremoveManager::new();
        let position = decode("7k/4P3/8/8/8/8/8/4K3 b - - 0 1").expect("decode");

        assert_eq!(
            manager.enqueue(&position, sq("e7"), sq("e8"), PieceColor::White),
            Ok(EnqueueOutcome::AwaitingPromotion)
        );
        assert!(manager.has_pending_promotion());
        assert!(manager.is_empty());
        // No entry, so the preview must not show a piece on e8 yet.
        assert_eq!(manager.preview(&position), position);

        assert!(manager.choose_promotion(PieceKind::Queen));
        assert!(!manager.has_pending_promotion());
        assert_eq!(manager.len(), 1);

        let preview = manager.preview(&position);
        assert_eq!(
            preview.piece_at(sq("e8")),
            Some(Piece::new(PieceColor::White, PieceKind::Queen))
        );
        assert_eq!(preview.side_to_move, position.side_to_move);

        assert!(!manager.choose_promotion(PieceKind::Rook));
    }

    #[test]
    fn cancel_pending_promotion_discards_it() {
        let mut manager = PremoveManager::new();
        let position = decode("7k/4P3/8/8/8/8/8/4K3 b - - 0 1").expect("decode");

        manager
            .enqueue(&position, sq("e7"), sq("e8"), PieceColor::White)
            .expect("enqueue");
        assert!(manager.cancel_pending_promotion());
        assert!(!manager.has_pending_promotion());
        assert!(!manager.cancel_pending_promotion());
    }

    #[test]
    fn drain_executes_at_most_one_entry() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let queued_against = initial_black_to_move();

        manager
            .enqueue(&queued_against, sq("e2"), sq("e4"), PieceColor::White)
            .expect("enqueue");
        manager
            .enqueue(&queued_against, sq("g1"), sq("f3"), PieceColor::White)
            .expect("enqueue");

        // Turn change arrives: it is white's move now.
        let authoritative = Position::initial();
        let outcome = manager.drain(&authoritative, &oracle).expect("drain");
        let position = match outcome {
            DrainOutcome::Executed { mv, position } => {
                assert_eq!(mv, Move::new(sq("e2"), sq("e4")));
                position
            }
            other => panic!("expected execution, got {other:?}"),
        };

        // Exactly one executed; the knight premove stays queued.
        assert_eq!(manager.len(), 1);
        assert_eq!(position.side_to_move, PieceColor::Black);
    }

    #[test]
    fn drain_cancels_head_when_source_piece_is_gone() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let queued_against = initial_black_to_move();

        manager
            .enqueue(&queued_against, sq("e2"), sq("e4"), PieceColor::White)
            .expect("enqueue");
        manager
            .enqueue(&queued_against, sq("e4"), sq("e5"), PieceColor::White)
            .expect("enqueue");

        // The e2 pawn was captured while queued.
        let authoritative =
            decode("rnbqkbnr/pppppppp/8/8/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1").expect("decode");
        let outcome = manager.drain(&authoritative, &oracle).expect("drain");
        match outcome {
            DrainOutcome::HeadCancelled { cancelled } => {
                assert_eq!(cancelled.from, sq("e2"));
            }
            other => panic!("expected head cancellation, got {other:?}"),
        }
        // No execution happened this turn change; the follow-up entry was
        // not attempted.
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn drain_discards_whole_queue_on_legality_mismatch() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let queued_against = initial_black_to_move();

        manager
            .enqueue(&queued_against, sq("b1"), sq("c3"), PieceColor::White)
            .expect("enqueue");
        manager
            .enqueue(&queued_against, sq("a2"), sq("a3"), PieceColor::White)
            .expect("enqueue");

        // c3 is occupied by an own pawn in the real position: the knight
        // premove fails exact-match legality.
        let authoritative =
            decode("rnbqkbnr/pppppppp/8/8/8/2P5/PP1PPPPP/RNBQKBNR w KQkq - 0 1").expect("decode");
        let outcome = manager.drain(&authoritative, &oracle).expect("drain");
        assert_eq!(outcome, DrainOutcome::Invalidated { dropped: 2 });
        assert!(manager.is_empty());
    }

    #[test]
    fn drain_with_empty_queue_is_idle() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let outcome = manager.drain(&Position::initial(), &oracle).expect("drain");
        assert_eq!(outcome, DrainOutcome::Idle);
    }

    #[test]
    fn clear_drops_queue_and_pending() {
        let mut manager = PremoveManager::new();
        let position = initial_black_to_move();

        manager
            .enqueue(&position, sq("e2"), sq("e4"), PieceColor::White)
            .expect("enqueue");
        manager
            .enqueue(&position, sq("d2"), sq("d4"), PieceColor::White)
            .expect("enqueue");

        assert_eq!(manager.clear(), 2);
        assert!(manager.is_empty());
        assert!(!manager.has_pending_promotion());
        assert_eq!(manager.preview(&position), position);
    }

    #[test]
    fn restored_head_drains_again_in_order() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let queued_against = initial_black_to_move();

        manager
            .enqueue(&queued_against, sq("e2"), sq("e4"), PieceColor::White)
            .expect("enqueue");
        manager
            .enqueue(&queued_against, sq("g1"), sq("f3"), PieceColor::White)
            .expect("enqueue");

        let authoritative = Position::initial();
        let head = match manager.drain(&authoritative, &oracle).expect("drain") {
            DrainOutcome::Executed { mv, .. } => Premove {
                from: mv.from,
                to: mv.to,
                piece: authoritative.piece_at(mv.from).expect("piece"),
                promotion: mv.promotion,
                awaiting_promotion: false,
            },
            other => panic!("expected execution, got {other:?}"),
        };
        assert_eq!(manager.len(), 1);

        manager.restore_head(head);
        assert_eq!(manager.len(), 2);
        // Back at the head: the preview shows it and the next drain retries
        // it before anything queued behind it.
        assert!(manager.preview(&authoritative).piece_at(sq("e4")).is_some());
        let outcome = manager.drain(&authoritative, &oracle).expect("drain");
        match outcome {
            DrainOutcome::Executed { mv, .. } => {
                assert_eq!(mv, Move::new(sq("e2"), sq("e4")));
            }
            other => panic!("expected execution, got {other:?}"),
        }
    }

    #[test]
    fn drained_promotion_requires_exact_choice_match() {
        let oracle = ShakmatyOracle::new();
        let mut manager = PremoveManager::new();
        let queued_against = decode("7k/4P3/8/8/8/8/8/4K3 b - - 0 1").expect("decode");

        manager
            .enqueue(&queued_against, sq("e7"), sq("e8"), PieceColor::White)
            .expect("enqueue");
        manager.choose_promotion(PieceKind::Knight);

        let authoritative = decode("7k/4P3/8/8/8/8/8/4K3 w - - 0 1").expect("decode");
        let outcome = manager.drain(&authoritative, &oracle).expect("drain");
        match outcome {
            DrainOutcome::Executed { mv, position } => {
                assert_eq!(mv.promotion, Some(PieceKind::Knight));
                assert_eq!(
                    position.piece_at(sq("e8")).map(|p| p.kind),
                    Some(PieceKind::Knight)
                );
            }
            other => panic!("expected execution, got {other:?}"),
        }
    }
}
