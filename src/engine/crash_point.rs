//! Crash point selection
//!
//! Resolution order: operator one-shot override, then the configured
//! candidate list, then a weighted continuous default distribution.

use crate::engine::types::round2;
use rand::Rng;
use std::sync::Mutex;
use tracing::info;

/// Produces the multiplier at which the next round ends
///
/// Stateless apart from the one-shot override, which is consumed on use.
/// `next` is called exactly once per round, at the WAITING -> RUNNING
/// transition.
pub struct CrashPointGenerator {
    override_point: Mutex<Option<f64>>,
    candidates: Vec<f64>,
}

impl CrashPointGenerator {
    /// Create a generator with an optional discrete candidate list
    ///
    /// Candidates are validated at config load, so anything below 1.00 here
    /// is a programming error and is dropped.
    pub fn new(candidates: Vec<f64>) -> Self {
        let candidates: Vec<f64> = candidates
            .into_iter()
            .filter(|c| c.is_finite() && *c >= 1.0)
            .collect();

        Self {
            override_point: Mutex::new(None),
            candidates,
        }
    }

    /// Arm a one-shot override for the next round
    ///
    /// Returns false (and stores nothing) for values below 1.00 or
    /// non-finite values, rather than consuming a bad override later.
    pub fn set_override(&self, value: f64) -> bool {
        if !value.is_finite() || value < 1.0 {
            return false;
        }
        let mut slot = self.override_point.lock().unwrap();
        *slot = Some(round2(value));
        info!("crash point override armed for next round");
        true
    }

    /// Discard any armed override
    pub fn clear_override(&self) {
        *self.override_point.lock().unwrap() = None;
    }

    /// Next crash point, always >= 1.00 and rounded to 2 decimals
    pub fn next(&self) -> f64 {
        self.next_with_rng(&mut rand::thread_rng())
    }

    fn next_with_rng<R: Rng>(&self, rng: &mut R) -> f64 {
        if let Some(value) = self.override_point.lock().unwrap().take() {
            return value;
        }

        if !self.candidates.is_empty() {
            let idx = rng.gen_range(0..self.candidates.len());
            return round2(self.candidates[idx]);
        }

        // Weighted default: half the rounds end below 5x, a long tail
        // reaches up to 150x.
        let r: f64 = rng.gen();
        let value = if r < 0.50 {
            rng.gen_range(1.00..5.00)
        } else if r < 0.80 {
            rng.gen_range(5.00..50.00)
        } else if r < 0.95 {
            rng.gen_range(50.00..100.00)
        } else {
            rng.gen_range(100.00..150.00)
        };

        round2(value).max(1.0)
    }
}
