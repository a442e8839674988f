//! Error types for the round engine
//!
//! Validation failures are rejected synchronously with no state mutation;
//! ledger failures carry enough context to decide between cancel and retry.

use thiserror::Error;

/// Errors surfaced by the engine's player-facing operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Stake must be a positive finite amount and any auto cash-out
    /// threshold must exceed 1.00
    #[error("invalid stake or auto cash-out threshold")]
    InvalidStake,

    /// Wager is no longer pending, or the caller does not own it
    #[error("wager is not cancellable")]
    NotCancellable,

    /// Wager was already cashed out
    #[error("wager already settled")]
    AlreadySettled,

    /// Wager is not active in the current running round
    #[error("wager is not active")]
    NotActive,

    /// Owner's balance does not cover the requested amount
    #[error("insufficient funds")]
    InsufficientFunds,

    /// The balance ledger could not be reached
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

/// Convenience alias for engine results
pub type EngineResult<T> = Result<T, EngineError>;
