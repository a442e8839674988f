//! The round aggregate
//!
//! One `RoundState` instance holds the round's phase fields and wager sets.
//! All mutation goes through the single `RwLock` owned by the engine, so
//! these methods are plain synchronous state transitions; the engine applies
//! ledger results around them.

use crate::engine::types::{
    round2, RoundPhase, RoundSnapshot, Wager, WagerId, WagerState,
};
use crate::errors::{EngineError, EngineResult};
use std::collections::{HashMap, VecDeque};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Crash points kept for viewers, most recent first
pub const HISTORY_LIMIT: usize = 15;

/// A payout whose credit could not be confirmed yet; retried until the
/// ledger accepts it
#[derive(Debug, Clone)]
pub struct QueuedCredit {
    pub wager_id: WagerId,
    pub owner: String,
    pub amount: f64,
}

/// Result of recomputing the multiplier on a tick
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Multiplier after clamping to the crash point
    pub multiplier: f64,
    /// True once the raw curve reached the crash point
    pub crashed: bool,
}

/// Live round state: phase, multiplier curve, wager map, crash history
pub struct RoundState {
    phase: RoundPhase,
    crash_point: f64,
    multiplier: f64,
    started_at: Option<Instant>,
    countdown: Option<u64>,
    growth_rate: f64,
    history: VecDeque<f64>,
    wagers: HashMap<WagerId, Wager>,
    queued_credits: Vec<QueuedCredit>,
}

/// Multiplier after `elapsed` of running time: an accelerating exponential
/// curve anchored at 1.00, independent of tick count
pub fn multiplier_for(elapsed: Duration, growth_rate: f64) -> f64 {
    round2((growth_rate * elapsed.as_secs_f64()).exp().max(1.0))
}

impl RoundState {
    pub fn new(growth_rate: f64) -> Self {
        Self {
            phase: RoundPhase::Waiting,
            crash_point: 1.0,
            multiplier: 1.0,
            started_at: None,
            countdown: None,
            growth_rate,
            history: VecDeque::new(),
            wagers: HashMap::new(),
            queued_credits: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn crash_point(&self) -> f64 {
        self.crash_point
    }

    pub fn wager(&self, id: &WagerId) -> Option<&Wager> {
        self.wagers.get(id)
    }

    /// Admit a new wager, always Pending regardless of phase; no balance
    /// check happens until the next admission pass
    pub fn submit(
        &mut self,
        owner: &str,
        stake: f64,
        auto_cashout: Option<f64>,
    ) -> EngineResult<WagerId> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(EngineError::InvalidStake);
        }
        if let Some(threshold) = auto_cashout {
            if !threshold.is_finite() || threshold <= 1.0 {
                return Err(EngineError::InvalidStake);
            }
        }

        let id = Uuid::new_v4();
        self.wagers.insert(
            id,
            Wager {
                id,
                owner: owner.to_string(),
                stake,
                auto_cashout,
                state: WagerState::Pending,
                settled_multiplier: None,
            },
        );
        Ok(id)
    }

    /// Cancel a wager before admission; only valid while Pending and only
    /// for the owner
    pub fn cancel(&mut self, id: WagerId, owner: &str) -> EngineResult<Wager> {
        match self.wagers.get_mut(&id) {
            Some(wager) if wager.state == WagerState::Pending && wager.owner == owner => {
                wager.state = WagerState::Cancelled;
                Ok(wager.clone())
            }
            _ => Err(EngineError::NotCancellable),
        }
    }

    /// Ids of wagers awaiting admission
    pub fn pending_ids(&self) -> Vec<WagerId> {
        self.wagers
            .values()
            .filter(|w| w.state == WagerState::Pending)
            .map(|w| w.id)
            .collect()
    }

    /// Promote a pending wager after its debit was confirmed
    pub fn mark_active(&mut self, id: WagerId) {
        if let Some(wager) = self.wagers.get_mut(&id) {
            if wager.state == WagerState::Pending {
                wager.state = WagerState::Active;
            }
        }
    }

    /// Cancel a pending wager whose debit failed; no money moved
    pub fn mark_cancelled(&mut self, id: WagerId) -> Option<Wager> {
        let wager = self.wagers.get_mut(&id)?;
        if wager.state != WagerState::Pending {
            return None;
        }
        wager.state = WagerState::Cancelled;
        Some(wager.clone())
    }

    /// WAITING -> RUNNING: fix the crash point and anchor the time base
    pub fn begin_round(&mut self, crash_point: f64, now: Instant) {
        self.phase = RoundPhase::Running;
        self.crash_point = crash_point.max(1.0);
        self.multiplier = 1.0;
        self.started_at = Some(now);
        self.countdown = None;
    }

    pub fn set_countdown(&mut self, seconds: u64) {
        self.countdown = Some(seconds);
    }

    /// Recompute the multiplier from wall-clock elapsed time
    ///
    /// The published multiplier never overshoots the crash point: the raw
    /// curve decides *whether* the round crashed, the clamped value is what
    /// wagers settle against.
    pub fn advance_multiplier(&mut self, now: Instant) -> Tick {
        let started = match self.started_at {
            Some(started) => started,
            None => {
                return Tick {
                    multiplier: self.multiplier,
                    crashed: false,
                }
            }
        };

        let raw = multiplier_for(now.duration_since(started), self.growth_rate);
        let multiplier = raw.min(self.crash_point);
        // Monotonic even if the clock source misbehaves
        self.multiplier = multiplier.max(self.multiplier);

        Tick {
            multiplier: self.multiplier,
            crashed: raw >= self.crash_point,
        }
    }

    /// Active wagers whose threshold the multiplier has reached, paired with
    /// that threshold (the value they settle at)
    pub fn auto_cashout_due(&self, multiplier: f64) -> Vec<(WagerId, f64)> {
        self.wagers
            .values()
            .filter(|w| w.state == WagerState::Active)
            .filter_map(|w| {
                w.auto_cashout
                    .filter(|threshold| multiplier >= *threshold)
                    .map(|threshold| (w.id, threshold))
            })
            .collect()
    }

    /// Mark a win; first writer wins, a repeat answers AlreadySettled
    pub fn settle_win(&mut self, id: WagerId, at_multiplier: f64) -> EngineResult<Wager> {
        match self.wagers.get_mut(&id) {
            Some(wager) if wager.state == WagerState::Active => {
                wager.state = WagerState::CashedOut;
                wager.settled_multiplier = Some(at_multiplier);
                Ok(wager.clone())
            }
            Some(wager) if wager.state == WagerState::CashedOut => {
                Err(EngineError::AlreadySettled)
            }
            _ => Err(EngineError::NotActive),
        }
    }

    /// RUNNING -> CRASHED: freeze the multiplier at the crash point, resolve
    /// every remaining active wager as lost, record the crash in history
    pub fn crash_round(&mut self) -> Vec<Wager> {
        self.phase = RoundPhase::Crashed;
        self.multiplier = self.crash_point;

        let mut lost = Vec::new();
        for wager in self.wagers.values_mut() {
            if wager.state == WagerState::Active {
                wager.state = WagerState::Lost;
                lost.push(wager.clone());
            }
        }

        self.history.push_front(self.crash_point);
        self.history.truncate(HISTORY_LIMIT);
        lost
    }

    /// CRASHED -> WAITING: supersede the round in place
    ///
    /// Terminal wagers have been handed to the ledger already and are
    /// dropped here; Pending wagers submitted mid-round carry over to the
    /// next admission pass.
    pub fn reset_for_waiting(&mut self) {
        self.phase = RoundPhase::Waiting;
        self.multiplier = 1.0;
        self.started_at = None;
        self.countdown = None;
        self.wagers.retain(|_, w| !w.state.is_terminal());
    }

    pub fn queue_credit(&mut self, credit: QueuedCredit) {
        self.queued_credits.push(credit);
    }

    /// Drain the retry queue; the caller re-queues anything that fails again
    pub fn take_queued_credits(&mut self) -> Vec<QueuedCredit> {
        std::mem::take(&mut self.queued_credits)
    }

    /// Crash history formatted for the wire, most recent first
    pub fn history_strings(&self) -> Vec<String> {
        self.history.iter().map(|p| format!("{:.2}", p)).collect()
    }

    /// Consistent point-in-time view for snapshot queries
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            phase: self.phase,
            multiplier: self.multiplier,
            history: self.history_strings(),
            seconds_remaining: match self.phase {
                RoundPhase::Waiting => self.countdown,
                _ => None,
            },
        }
    }
}
