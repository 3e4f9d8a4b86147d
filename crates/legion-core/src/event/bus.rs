//! Broadcast of [`LegionEvent`]s to every live subscriber.
//!
//! Events are fire-and-forget: a batch never waits on a subscriber, and a
//! subscriber that falls behind the ring buffer skips ahead to the newest
//! event instead of stalling the engine.

use tokio::sync::broadcast;
use tracing::{trace, warn};

use legion_types::channel::ChannelId;
use legion_types::event::LegionEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LegionEvent>,
}

impl EventBus {
    /// `capacity` is how many events a slow subscriber may trail by before it
    /// starts losing them.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every subscriber. Returns how many received it.
    pub fn publish(&self, event: LegionEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No event subscribers");
                0
            }
        }
    }

    /// Everything published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            channel: None,
        }
    }

    /// Only events belonging to `channel`.
    pub fn subscribe_channel(&self, channel: ChannelId) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            channel: Some(channel),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// One subscriber's view of the bus, optionally narrowed to a channel.
pub struct EventSubscription {
    receiver: broadcast::Receiver<LegionEvent>,
    channel: Option<ChannelId>,
}

impl EventSubscription {
    /// Next matching event, or `None` once the bus is gone.
    ///
    /// Lag is logged and skipped over.
    pub async fn recv(&mut self) -> Option<LegionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, channel = ?self.channel, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, event: &LegionEvent) -> bool {
        self.channel.is_none_or(|channel| event.channel_id() == channel)
    }
}
