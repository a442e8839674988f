//! End-to-end round lifecycle scenarios
//!
//! These run the real engine loop under tokio's paused clock, so the
//! waiting/running/crash pauses elapse instantly while multiplier timing
//! stays deterministic.

use crashline::config::EngineConfig;
use crashline::engine::{
    InMemoryLedger, LogNotifier, OutcomeKind, RoundEngine, RoundEvent, RoundPhase, WagerState,
};
use crashline::errors::EngineError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

fn test_config(candidates: Vec<f64>) -> EngineConfig {
    EngineConfig {
        waiting_secs: 1,
        crash_pause_secs: 1,
        tick_ms: 50,
        growth_rate: 0.06,
        subscriber_buffer: 8192,
        crash_point_candidates: candidates,
    }
}

fn build_engine(
    candidates: Vec<f64>,
    deposits: &[(&str, f64)],
) -> (Arc<RoundEngine>, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    for (owner, amount) in deposits {
        ledger.deposit(owner, *amount);
    }
    let engine = Arc::new(RoundEngine::new(
        test_config(candidates),
        ledger.clone(),
        Arc::new(LogNotifier),
    ));
    (engine, ledger)
}

async fn wait_for_phase(engine: &RoundEngine, phase: RoundPhase) {
    for _ in 0..20_000 {
        if engine.snapshot().await.phase == phase {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("phase {} never reached", phase);
}

async fn next_crash(events: &mut mpsc::Receiver<RoundEvent>) -> (f64, Vec<String>) {
    loop {
        match events.recv().await.expect("event stream ended") {
            RoundEvent::Crashed {
                multiplier,
                history,
            } => return (multiplier, history),
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn auto_cashout_settles_at_threshold_before_crash() {
    let (engine, ledger) = build_engine(vec![], &[("alice", 1_000.0)]);
    engine.set_crash_override(3.0);

    let wager_id = engine
        .submit_wager("alice", 100.0, Some(2.0))
        .await
        .unwrap();
    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    let (crashed_at, history) = next_crash(&mut events).await;
    assert_eq!(crashed_at, 3.0);
    assert_eq!(history[0], "3.00");

    // Threshold 2.00 on a 3.00 round: cashed out at exactly the threshold,
    // payout 200, balance 1000 - 100 + 200.
    assert_eq!(ledger.balance("alice"), Some(1_100.0));

    let outcomes = ledger.outcomes();
    let settled: Vec<_> = outcomes.iter().filter(|o| o.wager_id == wager_id).collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].status, WagerState::CashedOut);
    assert_eq!(settled[0].kind, OutcomeKind::Payout);
    assert_eq!(settled[0].amount, 200.0);
}

#[tokio::test(start_paused = true)]
async fn uncashed_wager_is_lost_without_credit() {
    let (engine, ledger) = build_engine(vec![1.5], &[("bob", 500.0)]);

    let wager_id = engine.submit_wager("bob", 50.0, None).await.unwrap();
    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    let (crashed_at, _) = next_crash(&mut events).await;
    assert_eq!(crashed_at, 1.5);

    // Stake debited at admission, never credited back.
    assert_eq!(ledger.balance("bob"), Some(450.0));

    let outcomes = ledger.outcomes();
    let terminal: Vec<_> = outcomes.iter().filter(|o| o.wager_id == wager_id).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].status, WagerState::Lost);
    assert_eq!(terminal[0].kind, OutcomeKind::Stake);
    assert_eq!(terminal[0].amount, 50.0);
}

#[tokio::test(start_paused = true)]
async fn multiplier_is_monotonic_and_ends_at_crash_point() {
    let (engine, _ledger) = build_engine(vec![], &[]);
    engine.set_crash_override(4.0);

    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    let mut last = 1.0;
    loop {
        match events.recv().await.expect("event stream ended") {
            RoundEvent::Running { multiplier } => {
                assert!(
                    multiplier >= last,
                    "multiplier went backwards: {} -> {}",
                    last,
                    multiplier
                );
                assert!(multiplier <= 4.0, "multiplier overshot crash point");
                last = multiplier;
            }
            RoundEvent::Crashed {
                multiplier,
                history,
            } => {
                assert_eq!(multiplier, 4.0);
                assert_eq!(history[0], "4.00");
                break;
            }
            RoundEvent::Waiting { .. } => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn submit_during_running_waits_for_next_admission() {
    // Round 1 crashes fast at 1.2; round 2 uses the candidate 1.5.
    let (engine, ledger) = build_engine(vec![1.5], &[("carol", 1_000.0)]);
    engine.set_crash_override(1.2);

    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    wait_for_phase(&engine, RoundPhase::Running).await;
    let wager_id = engine.submit_wager("carol", 75.0, None).await.unwrap();

    // Through the crash of round 1 the wager stays pending and undebited.
    let (crashed_at, _) = next_crash(&mut events).await;
    assert_eq!(crashed_at, 1.2);
    assert_eq!(engine.wager(wager_id).await.unwrap().state, WagerState::Pending);
    assert_eq!(ledger.balance("carol"), Some(1_000.0));

    // Admission at the next WAITING -> RUNNING transition debits it.
    wait_for_phase(&engine, RoundPhase::Waiting).await;
    wait_for_phase(&engine, RoundPhase::Running).await;
    assert_eq!(engine.wager(wager_id).await.unwrap().state, WagerState::Active);
    assert_eq!(ledger.balance("carol"), Some(925.0));

    let (crashed_at, _) = next_crash(&mut events).await;
    assert_eq!(crashed_at, 1.5);
    let outcomes = ledger.outcomes();
    let terminal: Vec<_> = outcomes.iter().filter(|o| o.wager_id == wager_id).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].status, WagerState::Lost);
}

#[tokio::test(start_paused = true)]
async fn override_applies_once_then_clears() {
    let (engine, _ledger) = build_engine(vec![2.0], &[]);
    engine.set_crash_override(10.0);

    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    let (first, _) = next_crash(&mut events).await;
    assert_eq!(first, 10.0);

    // Override consumed; the next round falls back to the candidate list.
    let (second, history) = next_crash(&mut events).await;
    assert_eq!(second, 2.0);
    assert_eq!(history[0], "2.00");
    assert_eq!(history[1], "10.00");
}

#[tokio::test(start_paused = true)]
async fn insufficient_balance_cancels_without_stalling_the_batch() {
    let (engine, ledger) = build_engine(vec![1.5], &[("rich", 1_000.0), ("poor", 10.0)]);

    let rich_id = engine.submit_wager("rich", 100.0, None).await.unwrap();
    let poor_id = engine.submit_wager("poor", 100.0, None).await.unwrap();
    tokio::spawn(engine.clone().run());

    wait_for_phase(&engine, RoundPhase::Running).await;

    // The failed debit cancelled one wager without blocking the other.
    assert_eq!(engine.wager(rich_id).await.unwrap().state, WagerState::Active);
    assert_eq!(
        engine.wager(poor_id).await.unwrap().state,
        WagerState::Cancelled
    );
    assert_eq!(ledger.balance("rich"), Some(900.0));
    assert_eq!(ledger.balance("poor"), Some(10.0));

    let outcomes = ledger.outcomes();
    let cancelled: Vec<_> = outcomes.iter().filter(|o| o.wager_id == poor_id).collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].status, WagerState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn manual_cash_out_is_idempotent() {
    let (engine, ledger) = build_engine(vec![5.0], &[("dave", 1_000.0)]);

    let wager_id = engine.submit_wager("dave", 100.0, None).await.unwrap();
    tokio::spawn(engine.clone().run());

    wait_for_phase(&engine, RoundPhase::Running).await;

    let wager = engine.cash_out(wager_id, "dave").await.unwrap();
    assert_eq!(wager.state, WagerState::CashedOut);
    let payout = wager.payout();
    assert!(payout >= 100.0);

    // Second call fails without paying again.
    assert_eq!(
        engine.cash_out(wager_id, "dave").await.unwrap_err(),
        EngineError::AlreadySettled
    );
    assert_eq!(ledger.balance("dave"), Some(900.0 + payout));

    let outcomes = ledger.outcomes();
    let settled: Vec<_> = outcomes.iter().filter(|o| o.wager_id == wager_id).collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].status, WagerState::CashedOut);
}

#[tokio::test(start_paused = true)]
async fn cash_out_by_wrong_owner_is_rejected() {
    let (engine, _ledger) = build_engine(vec![5.0], &[("eve", 1_000.0)]);

    let wager_id = engine.submit_wager("eve", 100.0, None).await.unwrap();
    tokio::spawn(engine.clone().run());
    wait_for_phase(&engine, RoundPhase::Running).await;

    assert_eq!(
        engine.cash_out(wager_id, "mallory").await.unwrap_err(),
        EngineError::NotActive
    );
    // The rejection mutated nothing; the owner can still cash out.
    assert!(engine.cash_out(wager_id, "eve").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn queued_credit_is_paid_once_ledger_recovers() {
    let (engine, ledger) = build_engine(vec![5.0], &[("frank", 1_000.0)]);

    let wager_id = engine.submit_wager("frank", 100.0, None).await.unwrap();
    tokio::spawn(engine.clone().run());
    wait_for_phase(&engine, RoundPhase::Running).await;

    // Ledger goes down after admission; the cash-out still settles, with
    // the payout queued instead of dropped.
    ledger.set_available(false);
    let wager = engine.cash_out(wager_id, "frank").await.unwrap();
    assert_eq!(wager.state, WagerState::CashedOut);
    let payout = wager.payout();
    assert_eq!(ledger.balance("frank"), Some(900.0));

    ledger.set_available(true);
    for _ in 0..20_000 {
        if ledger.balance("frank") == Some(900.0 + payout) {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ledger.balance("frank"), Some(900.0 + payout));

    // Paid exactly once, never also marked lost.
    assert_eq!(
        engine.cash_out(wager_id, "frank").await.unwrap_err(),
        EngineError::AlreadySettled
    );
}

#[tokio::test(start_paused = true)]
async fn history_is_capped_and_most_recent_first() {
    let (engine, _ledger) = build_engine(vec![1.2], &[]);

    let (_sub, mut events) = engine.subscribe().await;
    tokio::spawn(engine.clone().run());

    let mut last_history = Vec::new();
    for _ in 0..18 {
        let (_, history) = next_crash(&mut events).await;
        last_history = history;
    }

    assert_eq!(last_history.len(), 15);
    assert!(last_history.iter().all(|h| h == "1.20"));

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.history.len(), 15);
}
