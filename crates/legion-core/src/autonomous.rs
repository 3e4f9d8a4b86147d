//! Bookkeeping for the autonomous loop.
//!
//! Per channel this tracks at most one pending delayed trigger (a
//! `CancellationToken` tagged with a generation number) and whether a batch
//! is currently in flight. The loop itself lives in
//! [`crate::service::LegionService`]; this type only answers "may I start?"
//! and "is this timer still the current one?".

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use legion_types::channel::{AutoModeDelay, ChannelId};

/// A scheduled trigger that can be cancelled before it fires.
#[derive(Debug, Clone)]
pub struct PendingTick {
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct AutonomousLoop {
    pending: DashMap<ChannelId, PendingTick>,
    in_flight: Arc<DashSet<ChannelId>>,
    generation: AtomicU64,
}

impl AutonomousLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending trigger, cancelling any previous one.
    pub fn arm(&self, channel: ChannelId) -> PendingTick {
        let tick = PendingTick {
            generation: self.generation.fetch_add(1, Ordering::SeqCst),
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.pending.insert(channel, tick.clone()) {
            previous.token.cancel();
        }
        tick
    }

    /// Cancel the pending trigger, if any. Returns whether one was pending.
    pub fn disarm(&self, channel: &ChannelId) -> bool {
        match self.pending.remove(channel) {
            Some((_, tick)) => {
                tick.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the pending entry once its timer fired, unless it was replaced.
    pub fn fired(&self, channel: &ChannelId, generation: u64) {
        let _ = self
            .pending
            .remove_if(channel, |_, tick| tick.generation == generation);
    }

    pub fn is_pending(&self, channel: &ChannelId) -> bool {
        self.pending.contains_key(channel)
    }

    /// Claim the channel for one batch. `None` if a batch is already running.
    pub fn try_begin(&self, channel: ChannelId) -> Option<BatchGuard> {
        self.in_flight.insert(channel).then(|| BatchGuard {
            channel,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, channel: &ChannelId) -> bool {
        self.in_flight.contains(channel)
    }

    /// Draw the wait before the next batch. Called at schedule time so range
    /// edits apply from the next cycle on.
    pub fn draw_delay(delay: &AutoModeDelay) -> Duration {
        delay.draw(rand::rng().random::<f64>())
    }
}

/// Marks a channel busy until dropped.
#[derive(Debug)]
pub struct BatchGuard {
    channel: ChannelId,
    in_flight: Arc<DashSet<ChannelId>>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.channel);
    }
}
