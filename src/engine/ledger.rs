//! Wager ledger and notifier boundaries
//!
//! The external balance store is the single source of truth for money; the
//! engine only talks to it through these traits and treats every call as
//! fallible.

use crate::engine::types::WagerOutcome;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Failures reported by the balance ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Durable balance store consumed by the engine
#[async_trait]
pub trait WagerLedger: Send + Sync {
    /// Remove `amount` from the owner's balance
    async fn debit(&self, owner: &str, amount: f64) -> Result<(), LedgerError>;

    /// Add `amount` to the owner's balance
    async fn credit(&self, owner: &str, amount: f64) -> Result<(), LedgerError>;

    /// Durable audit write, attempted for every terminal wager transition
    async fn record_outcome(&self, outcome: WagerOutcome) -> Result<(), LedgerError>;
}

/// Fire-and-forget player notifications, not required for engine correctness
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &str, message: &str);
}

/// Notifier that just logs, for deployments without a delivery channel
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, owner: &str, message: &str) {
        info!("notify {}: {}", owner, message);
    }
}

/// In-memory ledger stub
///
/// Stands in for the external account system in tests and local runs. The
/// availability toggle simulates an outage so credit-retry behavior can be
/// exercised.
pub struct InMemoryLedger {
    balances: DashMap<String, f64>,
    outcomes: Mutex<Vec<WagerOutcome>>,
    available: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            outcomes: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Create the account if needed and add to its balance
    pub fn deposit(&self, owner: &str, amount: f64) {
        *self.balances.entry(owner.to_string()).or_insert(0.0) += amount;
    }

    pub fn balance(&self, owner: &str) -> Option<f64> {
        self.balances.get(owner).map(|b| *b)
    }

    /// Toggle simulated availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Recorded audit entries, oldest first
    pub fn outcomes(&self) -> Vec<WagerOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("ledger offline".to_string()))
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WagerLedger for InMemoryLedger {
    async fn debit(&self, owner: &str, amount: f64) -> Result<(), LedgerError> {
        self.check_available()?;
        match self.balances.get_mut(owner) {
            Some(mut balance) => {
                if *balance < amount {
                    return Err(LedgerError::InsufficientFunds);
                }
                *balance -= amount;
                Ok(())
            }
            None => Err(LedgerError::UnknownAccount(owner.to_string())),
        }
    }

    async fn credit(&self, owner: &str, amount: f64) -> Result<(), LedgerError> {
        self.check_available()?;
        match self.balances.get_mut(owner) {
            Some(mut balance) => {
                *balance += amount;
                Ok(())
            }
            None => Err(LedgerError::UnknownAccount(owner.to_string())),
        }
    }

    async fn record_outcome(&self, outcome: WagerOutcome) -> Result<(), LedgerError> {
        self.check_available()?;
        self.outcomes.lock().unwrap().push(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_and_credit() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("alice", 100.0);

        ledger.debit("alice", 40.0).await.unwrap();
        assert_eq!(ledger.balance("alice"), Some(60.0));

        ledger.credit("alice", 80.0).await.unwrap();
        assert_eq!(ledger.balance("alice"), Some(140.0));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("alice", 10.0);

        let err = ledger.debit("alice", 50.0).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds);
        // Balance untouched on failure
        assert_eq!(ledger.balance("alice"), Some(10.0));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = InMemoryLedger::new();
        let err = ledger.debit("ghost", 1.0).await.unwrap_err();
        assert_eq!(err, LedgerError::UnknownAccount("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let ledger = InMemoryLedger::new();
        ledger.deposit("alice", 100.0);
        ledger.set_available(false);

        assert!(matches!(
            ledger.debit("alice", 1.0).await,
            Err(LedgerError::Unavailable(_))
        ));

        ledger.set_available(true);
        assert!(ledger.debit("alice", 1.0).await.is_ok());
    }
}
