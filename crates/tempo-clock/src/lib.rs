//! Clock synchronization: reconstructs both players' remaining time from
//! periodic authoritative snapshots plus locally elapsed wall time.
//!
//! Every call takes `now` explicitly. The periodic driver is a cancellable
//! interval owned by the session runner, not a global timer.

use chrono::{DateTime, Utc};
use tempo_types::{
    board::PieceColor,
    clock::{ClockSnapshot, ClockView},
    config::ClockConfig,
};
use tracing::{debug, info};

/// Locally stored remaining-time values a tick is computed relative to.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    white_ms: u64,
    black_ms: u64,
}

impl Baseline {
    fn remaining(&self, side: PieceColor) -> u64 {
        match side {
            PieceColor::White => self.white_ms,
            PieceColor::Black => self.black_ms,
        }
    }

    fn set(&mut self, side: PieceColor, value: u64) {
        match side {
            PieceColor::White => self.white_ms = value,
            PieceColor::Black => self.black_ms = value,
        }
    }
}

#[derive(Debug)]
pub struct ClockEngine {
    baseline: Baseline,
    increment_ms: u64,
    active: PieceColor,
    last_sync: DateTime<Utc>,
    max_compensation_ms: u64,
    /// Ticking while true; frozen by stop() or a local timeout.
    running: bool,
    /// Local timeout already raised; raised at most once per freeze.
    flagged: bool,
}

impl ClockEngine {
    /// Engine primed from the first authoritative snapshot.
    pub fn new(config: &ClockConfig, snapshot: &ClockSnapshot, now: DateTime<Utc>) -> Self {
        let mut engine = Self {
            baseline: Baseline {
                white_ms: snapshot.white_ms,
                black_ms: snapshot.black_ms,
            },
            increment_ms: snapshot.increment_ms,
            active: snapshot.active,
            last_sync: now,
            max_compensation_ms: config.max_delay_compensation_ms,
            running: true,
            flagged: false,
        };
        engine.sync(snapshot, now);
        engine
    }

    pub fn active(&self) -> PieceColor {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Adopts an authoritative snapshot wholesale. One-way network delay is
    /// compensated on the active side only, clamped so a stalled connection
    /// cannot over-correct. Un-freezes a locally declared timeout: the
    /// server evidently still considers the match running.
    pub fn sync(&mut self, snapshot: &ClockSnapshot, now: DateTime<Utc>) {
        let delay_ms = (now - snapshot.issued_at)
            .num_milliseconds()
            .clamp(0, self.max_compensation_ms as i64) as u64;

        self.baseline = Baseline {
            white_ms: snapshot.white_ms,
            black_ms: snapshot.black_ms,
        };
        let active_remaining = self.baseline.remaining(snapshot.active);
        self.baseline
            .set(snapshot.active, active_remaining.saturating_sub(delay_ms));

        self.increment_ms = snapshot.increment_ms;
        self.active = snapshot.active;
        self.last_sync = now;
        self.running = true;
        self.flagged = false;
        debug!(delay_ms, active = ?snapshot.active, "clock re-based from snapshot");
    }

    /// Derives display values: the active side loses elapsed wall time since
    /// the last re-base (floored at zero), the inactive side is verbatim.
    pub fn view(&self, now: DateTime<Utc>) -> ClockView {
        let elapsed_ms = if self.running {
            (now - self.last_sync).num_milliseconds().max(0) as u64
        } else {
            0
        };
        let active_remaining = self
            .baseline
            .remaining(self.active)
            .saturating_sub(elapsed_ms);

        let mut view = ClockView {
            white_ms: self.baseline.white_ms,
            black_ms: self.baseline.black_ms,
            active: self.active,
        };
        match self.active {
            PieceColor::White => view.white_ms = active_remaining,
            PieceColor::Black => view.black_ms = active_remaining,
        }
        view
    }

    /// Periodic tick: returns the current view plus, exactly once, the side
    /// that flagged when the active display reaches zero. Ticking freezes
    /// after a flag; the server remains the final arbiter.
    pub fn tick(&mut self, now: DateTime<Utc>) -> (ClockView, Option<PieceColor>) {
        let view = self.view(now);
        if !self.running || self.flagged {
            return (view, None);
        }
        if view.remaining(self.active) == 0 {
            self.flagged = true;
            self.running = false;
            // Freeze the baseline at the flagged value.
            self.baseline.set(self.active, 0);
            info!(flagged = ?self.active, "local timeout declared");
            return (view, Some(self.active));
        }
        (view, None)
    }

    /// Optimistic re-base when the local player completes a move: the mover
    /// keeps the displayed remainder plus increment, sides flip, elapsed
    /// resets. Always overwritten by the next authoritative snapshot.
    pub fn on_local_move(&mut self, now: DateTime<Utc>) {
        if !self.running {
            return;
        }
        let view = self.view(now);
        let mover = self.active;
        self.baseline.set(
            mover,
            view.remaining(mover).saturating_add(self.increment_ms),
        );
        self.baseline
            .set(mover.opponent(), view.remaining(mover.opponent()));
        self.active = mover.opponent();
        self.last_sync = now;
    }

    /// Match completed: both displays freeze at their current values and
    /// ticking becomes a no-op.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        let view = self.view(now);
        self.baseline = Baseline {
            white_ms: view.white_ms,
            black_ms: view.black_ms,
        };
        self.running = false;
    }
}
