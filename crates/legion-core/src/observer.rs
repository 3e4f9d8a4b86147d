//! Progress callbacks for message-producing operations.
//!
//! The engine exposes no polling interface; everything a batch produces is
//! reported through a [`TurnObserver`] as it happens.

use legion_types::channel::ChannelId;
use legion_types::event::LegionEvent;
use legion_types::message::{ChatMessage, MessageId};
use legion_types::minion::MinionStatus;

use crate::event::EventBus;

pub trait TurnObserver: Send + Sync {
    /// A commander or minion message was created, finalized, or replaced.
    fn on_message(&self, message: &ChatMessage);

    /// A streamed increment was appended to an in-progress message.
    fn on_delta(&self, channel: &ChannelId, message: &MessageId, text: &str);

    /// A minion started or stopped perceiving or composing.
    fn on_status(&self, channel: &ChannelId, minion: &str, status: MinionStatus);

    /// A system diagnostic or credential audit record.
    fn on_notice(&self, message: &ChatMessage);
}

/// Discards every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {
    fn on_message(&self, _message: &ChatMessage) {}
    fn on_delta(&self, _channel: &ChannelId, _message: &MessageId, _text: &str) {}
    fn on_status(&self, _channel: &ChannelId, _minion: &str, _status: MinionStatus) {}
    fn on_notice(&self, _message: &ChatMessage) {}
}

/// Forwards callbacks onto the [`EventBus`] for WebSocket subscribers.
#[derive(Debug, Clone)]
pub struct EventBusObserver {
    bus: EventBus,
}

impl EventBusObserver {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl TurnObserver for EventBusObserver {
    fn on_message(&self, message: &ChatMessage) {
        self.bus.publish(LegionEvent::MessageUpserted {
            message: message.clone(),
        });
    }

    fn on_delta(&self, channel: &ChannelId, message: &MessageId, text: &str) {
        self.bus.publish(LegionEvent::MessageDelta {
            channel_id: *channel,
            message_id: *message,
            text: text.to_string(),
        });
    }

    fn on_status(&self, channel: &ChannelId, minion: &str, status: MinionStatus) {
        self.bus.publish(LegionEvent::MinionStatus {
            channel_id: *channel,
            minion_name: minion.to_string(),
            status,
        });
    }

    fn on_notice(&self, message: &ChatMessage) {
        self.bus.publish(LegionEvent::Notice {
            message: message.clone(),
        });
    }
}
