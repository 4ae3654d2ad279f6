//! Game progress state machine: the single logical thread that reconciles
//! server events, local input, and clock ticks into one coherent match view.
//!
//! All mutating entry points take `now` explicitly so the numeric clock
//! scenarios are testable without sleeping; the async runner is the only
//! place wall time and the tick interval are read.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tempo_clock::ClockEngine;
use tempo_premove::{DrainOutcome, EnqueueOutcome, Premove, PremoveManager};
use tempo_rules::{RulesOracle, Terminal};
use tempo_transport::Transport;
use tempo_types::{
    board::{PieceColor, PieceKind, Position, Square},
    clock::ClockView,
    config::{ClockConfig, TempoConfig},
    events::{
        ClientCommand, ClientMessage, Notice, PremoveCancelCause, ServerEvent, ServerMessage,
    },
    game::{EndReason, MatchResult, MatchState, Move, MoveHistory, MoveRecord},
    Result, TempoError,
};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

pub fn session_error(message: impl Into<String>) -> TempoError {
    TempoError::Session(message.into())
}

/// Standing draw-offer negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawOffer {
    None,
    Ours,
    Theirs,
}

/// One match, as seen from this client. Generic over the rules oracle and
/// the transport so tests can wire the in-process pair.
pub struct GameSession<O: RulesOracle, T: Transport> {
    oracle: O,
    transport: T,
    clock_config: ClockConfig,
    notice_backlog: usize,
    joined: bool,
    player: PieceColor,
    /// Last authoritative position. Never shows speculative pieces.
    position: Position,
    history: MoveHistory,
    state: MatchState,
    premoves: PremoveManager,
    clock: Option<ClockEngine>,
    in_check: bool,
    draw_offer: DrawOffer,
    /// Completed-by-local-timeout, pending server confirmation. The only
    /// completed state a later snapshot may revert.
    provisional_timeout: bool,
    notices: VecDeque<Notice>,
}

impl<O: RulesOracle, T: Transport> GameSession<O, T> {
    pub fn new(oracle: O, transport: T, config: &TempoConfig) -> Self {
        Self {
            oracle,
            transport,
            clock_config: config.clock.clone(),
            notice_backlog: config.session.notice_backlog,
            joined: false,
            player: PieceColor::White,
            position: Position::initial(),
            history: MoveHistory::new(Position::initial()),
            state: MatchState::Active,
            premoves: PremoveManager::new(),
            clock: None,
            in_check: false,
            draw_offer: DrawOffer::None,
            provisional_timeout: false,
            notices: VecDeque::new(),
        }
    }

    pub fn player(&self) -> PieceColor {
        self.player
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn in_check(&self) -> bool {
        self.in_check
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    pub fn premove_count(&self) -> usize {
        self.premoves.len()
    }

    pub fn has_pending_promotion(&self) -> bool {
        self.premoves.has_pending_promotion()
    }

    pub fn clock_view(&self, now: DateTime<Utc>) -> Option<ClockView> {
        self.clock.as_ref().map(|clock| clock.view(now))
    }

    /// What the UI should draw: the speculative preview at the live index,
    /// the recorded past position while the cursor reviews history.
    pub fn displayed_position(&self) -> Position {
        if self.history.is_live() {
            self.premoves.preview(&self.position)
        } else {
            self.history.position_at_cursor().clone()
        }
    }

    pub fn review_back(&mut self) {
        self.history.back();
    }

    pub fn review_forward(&mut self) {
        self.history.forward();
    }

    pub fn review_to_start(&mut self) {
        self.history.to_start();
    }

    pub fn review_to_live(&mut self) {
        self.history.to_live();
    }

    pub fn review_jump(&mut self, index: usize) -> bool {
        self.history.jump(index)
    }

    /// Hands accumulated notices to the embedding UI.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() == self.notice_backlog {
            warn!("notice backlog full, dropping oldest");
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    /// Whether local board input is currently meaningful: joined, match
    /// running, cursor at the live position.
    fn can_act_locally(&self) -> bool {
        self.joined && self.state.is_active() && self.history.is_live()
    }

    async fn submit(&mut self, command: ClientCommand) -> bool {
        match self.transport.send(ClientMessage::new(command)).await {
            Ok(()) => true,
            Err(err) => {
                warn!("command submission failed: {err}");
                self.push_notice(Notice::TransportFailure(err.to_string()));
                false
            }
        }
    }

    /// Records a confirmed move: adopts the position, appends to history,
    /// refreshes the check flag.
    fn record_move(&mut self, next: Position, by: PieceColor, mv: Move) -> Result<()> {
        let ply = self.history.len() as u32 + 1;
        self.position = next.clone();
        self.history.append(MoveRecord {
            ply,
            by,
            mv,
            position: next,
        });
        self.in_check = self.oracle.in_check(&self.position)?;
        let terminal = self.oracle.terminal(&self.position)?;
        if terminal != Terminal::None {
            // Local hint only; the server's MatchOver remains the verdict.
            debug!(?terminal, "terminal position reached locally");
        }
        Ok(())
    }

    fn finalize(&mut self, reason: EndReason, result: MatchResult, now: DateTime<Utc>) {
        self.state = MatchState::Completed { reason, result };
        self.provisional_timeout = false;
        self.draw_offer = DrawOffer::None;
        if let Some(clock) = self.clock.as_mut() {
            clock.stop(now);
        }
        let dropped = self.premoves.clear();
        if dropped > 0 {
            self.push_notice(Notice::PremovesCancelled {
                cause: PremoveCancelCause::Cleared,
                dropped,
            });
        }
        info!(?reason, ?result, "match completed");
    }

    /// Drains at most one premove against the fresh authoritative position
    /// and submits it when one executes.
    async fn drain_premoves(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.premoves.drain(&self.position, &self.oracle)? {
            DrainOutcome::Idle => {}
            DrainOutcome::HeadCancelled { cancelled } => {
                debug!(from = %cancelled.from, to = %cancelled.to, "premove head cancelled");
                self.push_notice(Notice::PremovesCancelled {
                    cause: PremoveCancelCause::SourceCaptured,
                    dropped: 1,
                });
            }
            DrainOutcome::Invalidated { dropped } => {
                self.push_notice(Notice::PremovesCancelled {
                    cause: PremoveCancelCause::Invalidated,
                    dropped,
                });
            }
            DrainOutcome::Executed { mv, position } => {
                if self.submit(ClientCommand::SubmitMove { mv }).await {
                    self.record_move(position, self.player, mv)?;
                    if let Some(clock) = self.clock.as_mut() {
                        clock.on_local_move(now);
                    }
                } else if let Some(piece) = self.position.piece_at(mv.from) {
                    // The server never saw the move. Put the entry back at
                    // the head so the user can retry or cancel; it is never
                    // resubmitted automatically.
                    self.premoves.restore_head(Premove {
                        from: mv.from,
                        to: mv.to,
                        piece,
                        promotion: mv.promotion,
                        awaiting_promotion: false,
                    });
                    debug!(from = %mv.from, to = %mv.to, "drained premove kept after send failure");
                }
            }
        }
        Ok(())
    }

    pub async fn handle_message(
        &mut self,
        message: ServerMessage,
        now: DateTime<Utc>,
    ) -> Result<()> {
        debug!(id = %message.id, "server message received");
        self.handle_event(message.event, now).await
    }

    pub async fn handle_event(&mut self, event: ServerEvent, now: DateTime<Utc>) -> Result<()> {
        match event {
            ServerEvent::Joined {
                position,
                state,
                clock,
                player,
            } => {
                let position = tempo_codec::decode(&position)?;
                self.position = position.clone();
                self.history = MoveHistory::new(position);
                self.state = state;
                self.player = player;
                self.clock = Some(ClockEngine::new(&self.clock_config, &clock, now));
                self.in_check = self.oracle.in_check(&self.position)?;
                // The adopted state is authoritative; any locally declared
                // timeout is obsolete.
                self.provisional_timeout = false;
                self.joined = true;
                info!(?player, "joined match");
            }
            ServerEvent::OpponentMoved { mv } => {
                if !self.state.is_active() {
                    if !self.provisional_timeout {
                        warn!("opponent move ignored: match not active");
                        return Ok(());
                    }
                    // The server still runs the match: the move supersedes
                    // the local flag the same way a fresher snapshot does.
                    self.provisional_timeout = false;
                    self.state = MatchState::Active;
                    self.push_notice(Notice::TimeoutReverted);
                    info!("local timeout reverted by authoritative move");
                }
                let next = self.oracle.apply(&self.position, &mv)?;
                self.record_move(next, self.player.opponent(), mv)?;
                self.drain_premoves(now).await?;
            }
            ServerEvent::ClockSync(snapshot) => {
                if !self.state.is_active() && !self.provisional_timeout {
                    debug!("clock snapshot ignored: match finished");
                    return Ok(());
                }
                if let Some(clock) = self.clock.as_mut() {
                    clock.sync(&snapshot, now);
                }
                if self.provisional_timeout {
                    // The server still considers the match running.
                    self.provisional_timeout = false;
                    self.state = MatchState::Active;
                    self.push_notice(Notice::TimeoutReverted);
                    info!("local timeout reverted by authoritative snapshot");
                }
            }
            ServerEvent::MatchOver { reason, result, .. } => {
                self.finalize(reason, result, now);
            }
            ServerEvent::Resigned { by, .. } => {
                self.finalize(
                    EndReason::Resignation,
                    MatchResult::win_for(by.opponent()),
                    now,
                );
            }
            ServerEvent::DrawOffered => {
                self.draw_offer = DrawOffer::Theirs;
                self.push_notice(Notice::DrawOfferReceived);
            }
            ServerEvent::DrawAccepted => {
                self.draw_offer = DrawOffer::None;
                self.push_notice(Notice::DrawOfferAccepted);
            }
            ServerEvent::DrawDeclined => {
                self.draw_offer = DrawOffer::None;
                self.push_notice(Notice::DrawOfferDeclined);
            }
            ServerEvent::DrawWithdrawn => {
                self.draw_offer = DrawOffer::None;
                self.push_notice(Notice::DrawOfferWithdrawn);
            }
            ServerEvent::Unknown(payload) => {
                warn!(%payload, "unrecognized server event skipped");
            }
        }
        Ok(())
    }

    /// Attempts an immediate move on the player's own turn. Returns whether
    /// the move was accepted and submitted.
    pub async fn try_move(&mut self, mv: Move, now: DateTime<Utc>) -> Result<bool> {
        if !self.can_act_locally() || self.position.side_to_move != self.player {
            debug!(from = %mv.from, to = %mv.to, "move refused: not accepting input");
            return Ok(false);
        }
        let legal = self.oracle.legal_moves(&self.position, Some(mv.from))?;
        if !legal.iter().any(|row| row.mv == mv) {
            debug!(from = %mv.from, to = %mv.to, "move refused: not legal");
            return Ok(false);
        }
        if !self.submit(ClientCommand::SubmitMove { mv }).await {
            return Ok(false);
        }
        let next = self.oracle.apply(&self.position, &mv)?;
        self.record_move(next, self.player, mv)?;
        if let Some(clock) = self.clock.as_mut() {
            clock.on_local_move(now);
        }
        Ok(true)
    }

    /// Queues a premove while waiting on the opponent. Rejections and a
    /// required promotion choice surface as notices.
    pub fn premove(&mut self, from: Square, to: Square) -> bool {
        if !self.can_act_locally() || self.position.side_to_move == self.player {
            debug!(%from, %to, "premove refused: not accepting speculative input");
            return false;
        }
        match self.premoves.enqueue(&self.position, from, to, self.player) {
            Ok(EnqueueOutcome::Queued) => true,
            Ok(EnqueueOutcome::AwaitingPromotion) => {
                self.push_notice(Notice::PromotionChoiceRequired);
                true
            }
            Err(reason) => {
                self.push_notice(Notice::PremoveRejected(reason));
                false
            }
        }
    }

    pub fn choose_promotion(&mut self, kind: PieceKind) -> bool {
        self.premoves.choose_promotion(kind)
    }

    pub fn cancel_pending_promotion(&mut self) -> bool {
        self.premoves.cancel_pending_promotion()
    }

    /// Drops the whole speculative queue on user request.
    pub fn cancel_premoves(&mut self) -> usize {
        let dropped = self.premoves.clear();
        if dropped > 0 {
            self.push_notice(Notice::PremovesCancelled {
                cause: PremoveCancelCause::Cleared,
                dropped,
            });
        }
        dropped
    }

    pub async fn resign(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        // State changes only when the server confirms with Resigned.
        self.submit(ClientCommand::Resign).await
    }

    pub async fn offer_draw(&mut self) -> bool {
        if !self.state.is_active() || self.draw_offer != DrawOffer::None {
            return false;
        }
        if self.submit(ClientCommand::OfferDraw).await {
            self.draw_offer = DrawOffer::Ours;
            return true;
        }
        false
    }

    pub async fn accept_draw(&mut self) -> bool {
        if !self.state.is_active() || self.draw_offer != DrawOffer::Theirs {
            return false;
        }
        if self.submit(ClientCommand::AcceptDraw).await {
            self.draw_offer = DrawOffer::None;
            return true;
        }
        false
    }

    pub async fn decline_draw(&mut self) -> bool {
        if !self.state.is_active() || self.draw_offer != DrawOffer::Theirs {
            return false;
        }
        if self.submit(ClientCommand::DeclineDraw).await {
            self.draw_offer = DrawOffer::None;
            return true;
        }
        false
    }

    pub async fn withdraw_draw_offer(&mut self) -> bool {
        if !self.state.is_active() || self.draw_offer != DrawOffer::Ours {
            return false;
        }
        if self.submit(ClientCommand::WithdrawDrawOffer).await {
            self.draw_offer = DrawOffer::None;
            return true;
        }
        false
    }

    /// Clock tick. Declares a provisional local timeout at most once; the
    /// server may later confirm it with MatchOver or revert it with a
    /// fresher snapshot.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<ClockView> {
        if !self.state.is_active() {
            return None;
        }
        let clock = self.clock.as_mut()?;
        let (view, flagged) = clock.tick(now);
        if let Some(side) = flagged {
            self.state = MatchState::Completed {
                reason: EndReason::Timeout,
                result: MatchResult::win_for(side.opponent()),
            };
            self.provisional_timeout = true;
            let dropped = self.premoves.clear();
            if dropped > 0 {
                self.push_notice(Notice::PremovesCancelled {
                    cause: PremoveCancelCause::Cleared,
                    dropped,
                });
            }
            self.push_notice(Notice::LocalTimeout { flagged: side });
            info!(?side, "provisional timeout declared");
        }
        Some(view)
    }

    /// Whether the match has reached a server-confirmed end.
    pub fn is_over(&self) -> bool {
        !self.state.is_active() && !self.provisional_timeout
    }

    /// Drives the session until the server confirms the match end or the
    /// transport closes. Interleaves the event stream with the clock tick.
    pub async fn run(&mut self) -> Result<()> {
        let mut events = self.transport.incoming();
        let mut ticker = interval(Duration::from_millis(self.clock_config.tick_interval_ms));
        loop {
            tokio::select! {
                maybe = events.next() => {
                    match maybe {
                        Some(message) => {
                            self.handle_message(message, Utc::now()).await?;
                            if self.is_over() {
                                break;
                            }
                        }
                        None => {
                            info!("transport stream closed, session ending");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempo_rules::ShakmatyOracle;
    use tempo_transport::{LocalTransport, ServerHandle};
    use tempo_types::{
        clock::ClockSnapshot,
        config::{OpsConfig, SessionConfig, TransportConfig},
        events::PremoveRejection,
    };

    fn sq(text: &str) -> Square {
        text.parse().expect("square")
    }

    fn config() -> TempoConfig {
        TempoConfig {
            clock: ClockConfig::default(),
            transport: TransportConfig {
                endpoint: "local".into(),
                auth_token: None,
            },
            session: SessionConfig { notice_backlog: 8 },
            ops: OpsConfig {
                log_level: "warn".into(),
            },
        }
    }

    fn snapshot(
        white_ms: u64,
        black_ms: u64,
        active: PieceColor,
        issued_at: DateTime<Utc>,
    ) -> ClockSnapshot {
        ClockSnapshot {
            white_ms,
            black_ms,
            increment_ms: 2_000,
            active,
            issued_at,
        }
    }

    fn joined(player: PieceColor, fen: &str, clock: ClockSnapshot) -> ServerEvent {
        ServerEvent::Joined {
            position: fen.into(),
            state: MatchState::Active,
            clock,
            player,
        }
    }

    const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    async fn session_as_white(
        now: DateTime<Utc>,
    ) -> (GameSession<ShakmatyOracle, LocalTransport>, ServerHandle) {
        let (transport, server) = LocalTransport::new(16);
        let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config());
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    INITIAL_FEN,
                    snapshot(60_000, 60_000, PieceColor::White, now),
                ),
                now,
            )
            .await
            .expect("join");
        (session, server)
    }

    #[tokio::test]
    async fn local_move_applies_and_submits() {
        let now = Utc::now();
        let (mut session, server) = session_as_white(now).await;
        let mut outbound = server.outbound();

        let executed = session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        assert!(executed);

        let sent = outbound.next().await.expect("submitted command");
        match sent.command {
            ClientCommand::SubmitMove { mv } => assert_eq!(mv, Move::new(sq("e2"), sq("e4"))),
            other => panic!("expected SubmitMove, got {other:?}"),
        }
        assert_eq!(session.position().side_to_move, PieceColor::Black);
        assert_eq!(session.history().len(), 1);

        // Clock re-based optimistically: it is black to move now.
        let view = session.clock_view(now).expect("clock view");
        assert_eq!(view.active, PieceColor::Black);

        // An illegal follow-up is refused without touching the state.
        let executed = session
            .try_move(Move::new(sq("e4"), sq("e6")), now)
            .await
            .expect("try_move");
        assert!(!executed);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn premove_drains_on_opponent_move() {
        let now = Utc::now();
        let (mut session, server) = session_as_white(now).await;
        let mut outbound = server.outbound();

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        let _ = outbound.next().await.expect("our first move");

        // Queue a speculative follow-up while black thinks.
        assert!(session.premove(sq("g1"), sq("f3")));
        assert_eq!(session.premove_count(), 1);
        // The preview already shows the knight on f3; authoritative does not.
        assert!(session.displayed_position().piece_at(sq("f3")).is_some());
        assert!(session.position().piece_at(sq("f3")).is_none());

        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("opponent move");

        // The drain executed and submitted the knight move.
        let sent = outbound.next().await.expect("drained premove");
        match sent.command {
            ClientCommand::SubmitMove { mv } => assert_eq!(mv, Move::new(sq("g1"), sq("f3"))),
            other => panic!("expected SubmitMove, got {other:?}"),
        }
        assert_eq!(session.premove_count(), 0);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.position().side_to_move, PieceColor::Black);
    }

    #[tokio::test]
    async fn premove_rejection_raises_notice() {
        let now = Utc::now();
        let (mut session, _server) = session_as_white(now).await;

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");

        // Not our piece.
        assert!(!session.premove(sq("e7"), sq("e5")));
        let notices = session.drain_notices();
        assert_eq!(
            notices,
            vec![Notice::PremoveRejected(PremoveRejection::NotYourPiece)]
        );

        // Premoving on our own turn is refused silently.
        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("opponent move");
        assert!(!session.premove(sq("d2"), sq("d4")));
    }

    #[tokio::test]
    async fn invalidated_queue_is_reported() {
        let now = Utc::now();
        let (mut session, _server) = session_as_white(now).await;

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        assert!(session.premove(sq("e4"), sq("e5")));
        assert!(session.premove(sq("d2"), sq("d4")));

        // Black occupies e5: the pawn push fails legality and the whole
        // queue is discarded.
        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("opponent move");

        assert_eq!(session.premove_count(), 0);
        assert!(session.drain_notices().contains(&Notice::PremovesCancelled {
            cause: PremoveCancelCause::Invalidated,
            dropped: 2,
        }));
    }

    #[tokio::test]
    async fn local_timeout_is_provisional_until_synced() {
        let t0 = Utc::now();
        let (transport, _server) = LocalTransport::new(16);
        let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config());
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    INITIAL_FEN,
                    snapshot(300, 60_000, PieceColor::White, t0),
                ),
                t0,
            )
            .await
            .expect("join");

        session.tick(t0 + ChronoDuration::milliseconds(100));
        assert!(session.state().is_active());

        session.tick(t0 + ChronoDuration::milliseconds(400));
        assert_eq!(
            session.state(),
            MatchState::Completed {
                reason: EndReason::Timeout,
                result: MatchResult::BlackWins,
            }
        );
        assert!(!session.is_over());
        assert!(session
            .drain_notices()
            .contains(&Notice::LocalTimeout {
                flagged: PieceColor::White,
            }));

        // The server disagrees: a fresher snapshot reverts the timeout.
        session
            .handle_event(
                ServerEvent::ClockSync(snapshot(
                    1_200,
                    60_000,
                    PieceColor::White,
                    t0 + ChronoDuration::milliseconds(500),
                )),
                t0 + ChronoDuration::milliseconds(500),
            )
            .await
            .expect("sync");
        assert!(session.state().is_active());
        assert_eq!(session.drain_notices(), vec![Notice::TimeoutReverted]);
    }

    #[tokio::test]
    async fn opponent_move_supersedes_provisional_timeout() {
        let t0 = Utc::now();
        let (transport, _server) = LocalTransport::new(16);
        let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config());
        // Black is on move with almost no time left.
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1",
                    snapshot(60_000, 200, PieceColor::Black, t0),
                ),
                t0,
            )
            .await
            .expect("join");

        session.tick(t0 + ChronoDuration::milliseconds(300));
        assert_eq!(
            session.state(),
            MatchState::Completed {
                reason: EndReason::Timeout,
                result: MatchResult::WhiteWins,
            }
        );

        // Black's move made it over the wire after all: it must be applied,
        // not dropped, and the local flag reverted.
        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                t0 + ChronoDuration::milliseconds(400),
            )
            .await
            .expect("opponent move");

        assert!(session.state().is_active());
        assert_eq!(session.history().len(), 1);
        assert!(session.position().piece_at(sq("e5")).is_some());
        assert!(session.drain_notices().contains(&Notice::TimeoutReverted));
    }

    #[tokio::test]
    async fn rejoin_clears_provisional_timeout() {
        let t0 = Utc::now();
        let (transport, _server) = LocalTransport::new(16);
        let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config());
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    INITIAL_FEN,
                    snapshot(200, 60_000, PieceColor::White, t0),
                ),
                t0,
            )
            .await
            .expect("join");
        session.tick(t0 + ChronoDuration::milliseconds(300));
        assert!(!session.is_over());
        session.drain_notices();

        // Reconnect: the adopted state is authoritative.
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    INITIAL_FEN,
                    snapshot(1_500, 60_000, PieceColor::White, t0 + ChronoDuration::milliseconds(400)),
                ),
                t0 + ChronoDuration::milliseconds(400),
            )
            .await
            .expect("rejoin");
        assert!(session.state().is_active());

        // A routine snapshot after the re-join must not claim a revert.
        session
            .handle_event(
                ServerEvent::ClockSync(snapshot(
                    1_400,
                    60_000,
                    PieceColor::White,
                    t0 + ChronoDuration::milliseconds(500),
                )),
                t0 + ChronoDuration::milliseconds(500),
            )
            .await
            .expect("sync");
        assert!(!session.drain_notices().contains(&Notice::TimeoutReverted));
    }

    #[tokio::test]
    async fn failed_premove_submission_keeps_entry_queued() {
        let now = Utc::now();
        let (mut session, server) = session_as_white(now).await;

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        assert!(session.premove(sq("g1"), sq("f3")));
        drop(server);

        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("opponent move");

        // The opponent's move was recorded, the drained entry was not lost.
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.premove_count(), 1);
        assert!(session.displayed_position().piece_at(sq("f3")).is_some());
        assert!(session
            .drain_notices()
            .iter()
            .any(|n| matches!(n, Notice::TransportFailure(_))));
    }

    #[tokio::test]
    async fn authoritative_match_over_is_final() {
        let now = Utc::now();
        let (mut session, _server) = session_as_white(now).await;

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        assert!(session.premove(sq("d2"), sq("d4")));

        session
            .handle_event(
                ServerEvent::Resigned {
                    by: PieceColor::Black,
                    rating_deltas: None,
                },
                now,
            )
            .await
            .expect("resigned");

        assert_eq!(
            session.state(),
            MatchState::Completed {
                reason: EndReason::Resignation,
                result: MatchResult::WhiteWins,
            }
        );
        assert!(session.is_over());
        assert_eq!(session.premove_count(), 0);

        // Nothing is accepted after the end.
        assert!(session.tick(now).is_none());
        let executed = session
            .try_move(Move::new(sq("d2"), sq("d4")), now)
            .await
            .expect("try_move");
        assert!(!executed);
        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("ignored move");
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn review_cursor_gates_live_input() {
        let now = Utc::now();
        let (mut session, _server) = session_as_white(now).await;

        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        session
            .handle_event(
                ServerEvent::OpponentMoved {
                    mv: Move::new(sq("e7"), sq("e5")),
                },
                now,
            )
            .await
            .expect("opponent move");

        session.review_back();
        assert!(!session.history().is_live());
        // The displayed position is the past one, without the e5 pawn.
        assert!(session.displayed_position().piece_at(sq("e5")).is_none());

        // Neither real moves nor premoves are accepted while reviewing.
        let executed = session
            .try_move(Move::new(sq("g1"), sq("f3")), now)
            .await
            .expect("try_move");
        assert!(!executed);

        session.review_to_live();
        let executed = session
            .try_move(Move::new(sq("g1"), sq("f3")), now)
            .await
            .expect("try_move");
        assert!(executed);
    }

    #[tokio::test]
    async fn draw_negotiation_tracks_offer_state() {
        let now = Utc::now();
        let (mut session, server) = session_as_white(now).await;
        let mut outbound = server.outbound();

        // Withdraw without a standing offer of ours is refused.
        assert!(!session.withdraw_draw_offer().await);
        assert!(session.offer_draw().await);
        assert!(!session.offer_draw().await);
        assert!(session.withdraw_draw_offer().await);

        let first = outbound.next().await.expect("offer");
        assert!(matches!(first.command, ClientCommand::OfferDraw));
        let second = outbound.next().await.expect("withdraw");
        assert!(matches!(second.command, ClientCommand::WithdrawDrawOffer));

        // Accept is only valid against the opponent's standing offer.
        assert!(!session.accept_draw().await);
        session
            .handle_event(ServerEvent::DrawOffered, now)
            .await
            .expect("offer");
        assert!(session
            .drain_notices()
            .contains(&Notice::DrawOfferReceived));
        assert!(session.accept_draw().await);
        let third = outbound.next().await.expect("accept");
        assert!(matches!(third.command, ClientCommand::AcceptDraw));
    }

    #[tokio::test]
    async fn transport_failure_leaves_state_intact() {
        let now = Utc::now();
        let (transport, server) = LocalTransport::new(16);
        let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config());
        session
            .handle_event(
                joined(
                    PieceColor::White,
                    INITIAL_FEN,
                    snapshot(60_000, 60_000, PieceColor::White, now),
                ),
                now,
            )
            .await
            .expect("join");
        drop(server);

        let executed = session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");
        assert!(!executed);
        assert_eq!(session.history().len(), 0);
        assert_eq!(session.position().side_to_move, PieceColor::White);
        assert!(matches!(
            session.drain_notices().as_slice(),
            [Notice::TransportFailure(_)]
        ));
    }

    #[tokio::test]
    async fn notice_backlog_is_bounded() {
        let now = Utc::now();
        let (mut session, _server) = session_as_white(now).await;
        session
            .try_move(Move::new(sq("e2"), sq("e4")), now)
            .await
            .expect("try_move");

        for _ in 0..20 {
            // Rejected premoves each raise a notice.
            session.premove(sq("e7"), sq("e5"));
        }
        let notices = session.drain_notices();
        assert_eq!(notices.len(), config().session.notice_backlog);
    }
}
