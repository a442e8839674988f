//! Crashline - Crash Game Round Engine
//!
//! A continuously repeating crash game: a shared multiplier climbs from 1.00
//! on a fixed tick cadence until a hidden crash point ends the round, at
//! which time every wager not cashed out is forfeited. The engine owns phase
//! sequencing, crash point selection, wager admission and settlement,
//! per-tick auto cash-out evaluation, and fan-out of state updates to
//! subscribed viewers. Balances and audit records live behind the
//! `WagerLedger` boundary; this crate never stores money itself.

pub mod api;
pub mod config;
pub mod engine;
pub mod errors;
