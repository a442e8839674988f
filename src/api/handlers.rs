//! REST handlers
//!
//! Each handler validates the request shape, delegates to the engine, and
//! maps `EngineError` to an HTTP response via `ApiError`.

use super::errors::ApiError;
use super::models::*;
use crate::engine::ledger::InMemoryLedger;
use crate::engine::types::{RoundSnapshot, WagerId};
use crate::engine::RoundEngine;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler
pub struct AppState {
    pub engine: Arc<RoundEngine>,
    /// Stub collaborator standing in for the external account system
    pub ledger: Arc<InMemoryLedger>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        subscribers: state.engine.subscriber_count(),
    })
}

pub async fn round_handler(State(state): State<Arc<AppState>>) -> Json<RoundSnapshot> {
    Json(state.engine.snapshot().await)
}

pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.snapshot().await.history)
}

pub async fn submit_wager_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitWagerRequest>,
) -> Result<Json<SubmitWagerResponse>, ApiError> {
    if request.owner.trim().is_empty() {
        return Err(ApiError::bad_request("owner must not be empty"));
    }

    let wager_id = state
        .engine
        .submit_wager(&request.owner, request.stake, request.auto_cashout)
        .await?;

    let wager = state
        .engine
        .wager(wager_id)
        .await
        .ok_or_else(|| ApiError::not_found("wager vanished after submit"))?;

    Ok(Json(SubmitWagerResponse {
        wager_id,
        state: wager.state,
    }))
}

pub async fn cancel_wager_handler(
    State(state): State<Arc<AppState>>,
    Path(wager_id): Path<WagerId>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.cancel_wager(wager_id, &request.owner).await?;
    Ok(Json(serde_json::json!({ "wager_id": wager_id, "state": "CANCELLED" })))
}

pub async fn cash_out_handler(
    State(state): State<Arc<AppState>>,
    Path(wager_id): Path<WagerId>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<CashOutResponse>, ApiError> {
    let wager = state.engine.cash_out(wager_id, &request.owner).await?;
    let multiplier = wager.settled_multiplier.unwrap_or(1.0);

    Ok(Json(CashOutResponse {
        wager_id,
        multiplier,
        payout: wager.payout(),
    }))
}

pub async fn crash_override_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CrashOverrideRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.engine.set_crash_override(request.crash_point) {
        return Err(ApiError::bad_request(
            "crash point override must be a finite value >= 1.00",
        ));
    }
    info!("operator armed crash point override");
    Ok(Json(serde_json::json!({ "armed": true })))
}

pub async fn deposit_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    if request.owner.trim().is_empty() {
        return Err(ApiError::bad_request("owner must not be empty"));
    }
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(ApiError::bad_request("amount must be positive"));
    }

    state.ledger.deposit(&request.owner, request.amount);
    let balance = state.ledger.balance(&request.owner).unwrap_or(0.0);
    Ok(Json(BalanceResponse {
        owner: request.owner,
        balance,
    }))
}

pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    match state.ledger.balance(&owner) {
        Some(balance) => Ok(Json(BalanceResponse { owner, balance })),
        None => Err(ApiError::not_found(format!("unknown account: {}", owner))),
    }
}
