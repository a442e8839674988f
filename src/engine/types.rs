use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique wager identifier, assigned at submission
pub type WagerId = Uuid;

/// Round phase within the WAITING -> RUNNING -> CRASHED cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundPhase {
    Waiting,
    Running,
    Crashed,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Waiting => write!(f, "WAITING"),
            RoundPhase::Running => write!(f, "RUNNING"),
            RoundPhase::Crashed => write!(f, "CRASHED"),
        }
    }
}

/// Wager lifecycle state
///
/// A wager is debited exactly once (Pending -> Active) and credited at most
/// once (CashedOut); it reaches exactly one of the three terminal states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WagerState {
    Pending,
    Active,
    CashedOut,
    Lost,
    Cancelled,
}

impl WagerState {
    /// True once the wager can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WagerState::CashedOut | WagerState::Lost | WagerState::Cancelled
        )
    }
}

/// One player bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: WagerId,
    /// Opaque player identity from the external account system
    pub owner: String,
    pub stake: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cashout: Option<f64>,
    pub state: WagerState,
    /// Multiplier at cash-out time, set when state is CashedOut
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_multiplier: Option<f64>,
}

impl Wager {
    /// Payout for this wager: stake times settled multiplier for a win,
    /// zero otherwise
    pub fn payout(&self) -> f64 {
        match (self.state, self.settled_multiplier) {
            (WagerState::CashedOut, Some(multiplier)) => round2(self.stake * multiplier),
            _ => 0.0,
        }
    }
}

/// Whether an audit entry records money staked or money paid out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Stake,
    Payout,
}

/// Durable audit record handed to the ledger for every terminal transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerOutcome {
    pub wager_id: WagerId,
    pub owner: String,
    pub amount: f64,
    pub kind: OutcomeKind,
    pub status: WagerState,
}

/// Point-in-time view of the live round, safe to share with any caller
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub phase: RoundPhase,
    pub multiplier: f64,
    /// Last crash points, most recent first, formatted to 2 decimals
    pub history: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,
}

impl RoundSnapshot {
    /// Wire message mirroring this snapshot, used as the initial event for a
    /// new subscriber
    pub fn to_event(&self) -> RoundEvent {
        match self.phase {
            RoundPhase::Waiting => RoundEvent::Waiting {
                time: self.seconds_remaining.unwrap_or(0),
                history: self.history.clone(),
            },
            RoundPhase::Running => RoundEvent::Running {
                multiplier: self.multiplier,
            },
            RoundPhase::Crashed => RoundEvent::Crashed {
                multiplier: self.multiplier,
                history: self.history.clone(),
            },
        }
    }
}

/// Push messages delivered to subscribers
///
/// The crash point only ever appears in the Crashed message; the format of
/// these shapes is stable for viewers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum RoundEvent {
    #[serde(rename = "WAITING")]
    Waiting { time: u64, history: Vec<String> },

    #[serde(rename = "RUNNING")]
    Running { multiplier: f64 },

    #[serde(rename = "CRASHED")]
    Crashed { multiplier: f64, history: Vec<String> },
}

/// Round half-up to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
