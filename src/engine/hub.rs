//! Subscriber fan-out
//!
//! Each viewer gets its own bounded queue so a slow or dead consumer can
//! never block the tick path; on overflow the consumer is disconnected
//! rather than throttling everyone else.

use crate::engine::types::RoundEvent;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Identifies one connected viewer
pub type SubscriberId = u64;

/// Registry of connected viewers with best-effort ordered delivery
pub struct SubscriberHub {
    subscribers: DashMap<SubscriberId, mpsc::Sender<RoundEvent>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl SubscriberHub {
    /// `buffer` is the per-subscriber queue capacity
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a viewer; `initial` is enqueued immediately so the viewer is
    /// never blind before the next broadcast
    pub fn subscribe(&self, initial: RoundEvent) -> (SubscriberId, mpsc::Receiver<RoundEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.buffer);

        // Buffer is at least 1, so the snapshot always fits.
        let _ = tx.try_send(initial);
        self.subscribers.insert(id, tx);

        debug!(
            "subscriber {} connected (total: {})",
            id,
            self.subscribers.len()
        );
        (id, rx)
    }

    /// Remove a viewer; safe to call while a publish is in flight
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            debug!(
                "subscriber {} disconnected (remaining: {})",
                id,
                self.subscribers.len()
            );
        }
    }

    /// Deliver `event` to every registered viewer without blocking
    ///
    /// A full queue means the consumer fell behind its capacity; it is
    /// dropped so delivery to the others is never delayed.
    pub fn publish(&self, event: &RoundEvent) {
        let mut stale = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("subscriber {} overflowed its queue, dropping", entry.key());
                    stale.push(*entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stale.push(*entry.key());
                }
            }
        }

        for id in stale {
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
