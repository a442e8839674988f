//! Request and response shapes for the REST surface

use crate::engine::types::{WagerId, WagerState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitWagerRequest {
    pub owner: String,
    pub stake: f64,
    /// Optional automatic cash-out threshold, must exceed 1.00
    #[serde(default)]
    pub auto_cashout: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitWagerResponse {
    pub wager_id: WagerId,
    pub state: WagerState,
}

/// Owner proof-of-identity for cancel and cash-out calls
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRequest {
    pub owner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashOutResponse {
    pub wager_id: WagerId,
    pub multiplier: f64,
    pub payout: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrashOverrideRequest {
    pub crash_point: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub owner: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub owner: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub subscribers: usize,
}
