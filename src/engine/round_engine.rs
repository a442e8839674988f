//! The round engine
//!
//! One spawned task owns the unending WAITING -> RUNNING -> CRASHED cycle.
//! Player-facing operations and the loop's own admission/resolution logic
//! all mutate the round aggregate behind a single `RwLock`, so a partial
//! admission or settlement can never be observed or interleaved. Snapshot
//! reads take the read half and run concurrently with the loop.

use crate::config::EngineConfig;
use crate::engine::crash_point::CrashPointGenerator;
use crate::engine::hub::{SubscriberHub, SubscriberId};
use crate::engine::ledger::{LedgerError, Notifier, WagerLedger};
use crate::engine::state::{QueuedCredit, RoundState};
use crate::engine::types::{
    round2, OutcomeKind, RoundEvent, RoundPhase, RoundSnapshot, Wager, WagerId, WagerOutcome,
    WagerState,
};
use crate::errors::{EngineError, EngineResult};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, sleep, Duration, Instant};
use tracing::{debug, info, warn};

/// Authoritative state machine for the crash game
pub struct RoundEngine {
    state: RwLock<RoundState>,
    hub: SubscriberHub,
    generator: CrashPointGenerator,
    ledger: Arc<dyn WagerLedger>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl RoundEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn WagerLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: RwLock::new(RoundState::new(config.growth_rate)),
            hub: SubscriberHub::new(config.subscriber_buffer),
            generator: CrashPointGenerator::new(config.crash_point_candidates.clone()),
            ledger,
            notifier,
            config,
        }
    }

    /// Drive rounds for the lifetime of the process
    pub async fn run(self: Arc<Self>) {
        info!("round engine started");
        loop {
            self.waiting_phase().await;
            self.running_phase().await;
            self.crashed_phase().await;
        }
    }

    // ---- phase loop ----

    /// Fixed countdown, one broadcast per second, then the admission pass
    async fn waiting_phase(&self) {
        for remaining in (1..=self.config.waiting_secs).rev() {
            {
                let mut state = self.state.write().await;
                state.set_countdown(remaining);
                self.hub.publish(&RoundEvent::Waiting {
                    time: remaining,
                    history: state.history_strings(),
                });
            }
            sleep(Duration::from_secs(1)).await;
        }
        self.admit_pending().await;
    }

    /// Atomically evaluate every pending wager against the ledger, then
    /// start the round
    ///
    /// One player's failed debit never stalls the rest of the batch; any
    /// debit that is not confirmed leaves the wager cancelled with no money
    /// moved.
    async fn admit_pending(&self) {
        let mut state = self.state.write().await;
        self.flush_queued_credits(&mut state).await;

        for id in state.pending_ids() {
            let (owner, stake) = match state.wager(&id) {
                Some(wager) => (wager.owner.clone(), wager.stake),
                None => continue,
            };

            match self.ledger.debit(&owner, stake).await {
                Ok(()) => {
                    state.mark_active(id);
                    debug!("wager {} admitted for {} (stake {:.2})", id, owner, stake);
                }
                Err(err) => {
                    warn!("wager {} cancelled at admission: {}", id, err);
                    if let Some(wager) = state.mark_cancelled(id) {
                        self.record_outcome(&wager).await;
                        if err == LedgerError::InsufficientFunds {
                            self.notifier
                                .notify(&owner, "wager cancelled: insufficient funds")
                                .await;
                        }
                    }
                }
            }
        }

        let crash_point = self.generator.next();
        state.begin_round(crash_point, Instant::now());
        debug!("round running, crash point {:.2}", crash_point);
    }

    /// Fixed-cadence ticks until the multiplier curve reaches the crash
    /// point; elapsed wall-clock time, not tick count, drives the curve
    async fn running_phase(&self) {
        let mut ticker = interval(Duration::from_millis(self.config.tick_ms));
        loop {
            ticker.tick().await;
            if self.tick().await {
                return;
            }
        }
    }

    /// One tick: retry queued credits, settle due auto cash-outs, then
    /// check the crash condition. Returns true once the round crashed.
    async fn tick(&self) -> bool {
        let mut state = self.state.write().await;
        self.flush_queued_credits(&mut state).await;

        let tick = state.advance_multiplier(Instant::now());

        // Auto cash-out is evaluated before the crash check so a wager whose
        // threshold the curve reached this tick is paid, not marked lost.
        for (id, threshold) in state.auto_cashout_due(tick.multiplier) {
            if let Err(err) = self.settle_win(&mut state, id, threshold).await {
                warn!("auto cash-out of wager {} failed: {}", id, err);
            }
        }

        if tick.crashed {
            let crashed_at = state.crash_point();
            let lost = state.crash_round();
            for wager in &lost {
                self.record_outcome(wager).await;
                self.notifier
                    .notify(
                        &wager.owner,
                        &format!("round crashed at {:.2}, wager lost", crashed_at),
                    )
                    .await;
            }
            self.hub.publish(&RoundEvent::Crashed {
                multiplier: crashed_at,
                history: state.history_strings(),
            });
            info!(
                "round crashed at {:.2} ({} wagers lost)",
                crashed_at,
                lost.len()
            );
            true
        } else {
            self.hub.publish(&RoundEvent::Running {
                multiplier: tick.multiplier,
            });
            false
        }
    }

    /// Post-crash pause, then supersede the round in place
    async fn crashed_phase(&self) {
        sleep(Duration::from_secs(self.config.crash_pause_secs)).await;
        let mut state = self.state.write().await;
        self.flush_queued_credits(&mut state).await;
        state.reset_for_waiting();
    }

    // ---- player-facing operations ----

    /// Submit a wager; accepted in any phase, always created Pending, and
    /// only debited at the next admission pass
    pub async fn submit_wager(
        &self,
        owner: &str,
        stake: f64,
        auto_cashout: Option<f64>,
    ) -> EngineResult<WagerId> {
        let mut state = self.state.write().await;
        let id = state.submit(owner, stake, auto_cashout)?;
        debug!("wager {} submitted by {} (stake {:.2})", id, owner, stake);
        Ok(id)
    }

    /// Withdraw a wager before admission
    pub async fn cancel_wager(&self, id: WagerId, owner: &str) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let wager = state.cancel(id, owner)?;
        self.record_outcome(&wager).await;
        debug!("wager {} cancelled by {}", id, owner);
        Ok(())
    }

    /// Manual cash-out at the current multiplier
    ///
    /// Shares the settlement path with the auto cash-out check; whichever
    /// gets the write lock first wins, the other sees AlreadySettled.
    pub async fn cash_out(&self, id: WagerId, owner: &str) -> EngineResult<Wager> {
        let mut state = self.state.write().await;

        match state.wager(&id) {
            Some(wager) if wager.owner != owner => return Err(EngineError::NotActive),
            Some(wager) if wager.state == WagerState::CashedOut => {
                return Err(EngineError::AlreadySettled)
            }
            Some(_) => {}
            None => return Err(EngineError::NotActive),
        }
        if state.phase() != RoundPhase::Running {
            return Err(EngineError::NotActive);
        }

        let multiplier = state.multiplier();
        self.settle_win(&mut state, id, multiplier).await
    }

    /// Consistent read-only view of the live round
    pub async fn snapshot(&self) -> RoundSnapshot {
        self.state.read().await.snapshot()
    }

    /// Current wager record, if still in the live working set
    pub async fn wager(&self, id: WagerId) -> Option<Wager> {
        self.state.read().await.wager(&id).cloned()
    }

    /// Register a viewer; the returned channel starts with a snapshot event
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<RoundEvent>) {
        let initial = self.state.read().await.snapshot().to_event();
        self.hub.subscribe(initial)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.hub.unsubscribe(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Operator control surface: one-shot crash point for the next round
    pub fn set_crash_override(&self, value: f64) -> bool {
        self.generator.set_override(value)
    }

    // ---- settlement internals ----

    /// Mark a win, credit the payout, record the outcome
    ///
    /// If the ledger is unreachable the payout is queued and retried until
    /// confirmed; a settled win is never dropped.
    async fn settle_win(
        &self,
        state: &mut RoundState,
        id: WagerId,
        at_multiplier: f64,
    ) -> EngineResult<Wager> {
        let wager = state.settle_win(id, at_multiplier)?;
        let payout = round2(wager.stake * at_multiplier);

        if let Err(err) = self.ledger.credit(&wager.owner, payout).await {
            warn!(
                "credit of {:.2} to {} failed ({}), queueing for retry",
                payout, wager.owner, err
            );
            state.queue_credit(QueuedCredit {
                wager_id: wager.id,
                owner: wager.owner.clone(),
                amount: payout,
            });
        }

        self.record_outcome(&wager).await;
        self.notifier
            .notify(
                &wager.owner,
                &format!("cashed out at {:.2} for {:.2}", at_multiplier, payout),
            )
            .await;
        Ok(wager)
    }

    /// Retry credits whose confirmation is still outstanding
    async fn flush_queued_credits(&self, state: &mut RoundState) {
        for credit in state.take_queued_credits() {
            match self.ledger.credit(&credit.owner, credit.amount).await {
                Ok(()) => info!(
                    "retried credit of {:.2} to {} for wager {} confirmed",
                    credit.amount, credit.owner, credit.wager_id
                ),
                Err(err) => {
                    debug!("credit retry for wager {} failed: {}", credit.wager_id, err);
                    state.queue_credit(credit);
                }
            }
        }
    }

    /// Audit write for a terminal transition; failures are logged, never
    /// fatal to the loop
    async fn record_outcome(&self, wager: &Wager) {
        let (kind, amount) = match wager.state {
            WagerState::CashedOut => (OutcomeKind::Payout, wager.payout()),
            _ => (OutcomeKind::Stake, wager.stake),
        };
        let outcome = WagerOutcome {
            wager_id: wager.id,
            owner: wager.owner.clone(),
            amount,
            kind,
            status: wager.state,
        };
        if let Err(err) = self.ledger.record_outcome(outcome).await {
            warn!("failed to record outcome for wager {}: {}", wager.id, err);
        }
    }
}
