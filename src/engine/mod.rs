pub mod crash_point;
pub mod hub;
pub mod ledger;
pub mod round_engine;
pub mod state;
pub mod types;

pub use crash_point::CrashPointGenerator;
pub use hub::{SubscriberHub, SubscriberId};
pub use ledger::{InMemoryLedger, LedgerError, LogNotifier, Notifier, WagerLedger};
pub use round_engine::RoundEngine;
pub use state::{RoundState, HISTORY_LIMIT};
pub use types::*;
