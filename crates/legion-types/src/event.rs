//! Event types for the Legion event bus.
//!
//! `LegionEvent` is broadcast while batches run so the WebSocket endpoint can
//! push progress to the presentation layer. All variants are Clone + Send + Sync
//! for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::message::{ChatMessage, MessageId};
use crate::minion::MinionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegionEvent {
    /// A message was created, finalized, or replaced.
    MessageUpserted { message: ChatMessage },

    /// A message was deleted.
    MessageDeleted {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    /// A streamed text increment for an in-progress message.
    MessageDelta {
        channel_id: ChannelId,
        message_id: MessageId,
        text: String,
    },

    /// A minion's activity changed.
    MinionStatus {
        channel_id: ChannelId,
        minion_name: String,
        status: MinionStatus,
    },

    /// A system or audit notice.
    Notice { message: ChatMessage },

    /// Autonomous mode was started or paused for a channel.
    AutoModeChanged { channel_id: ChannelId, active: bool },
}

impl LegionEvent {
    /// The channel this event belongs to.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            LegionEvent::MessageUpserted { message } | LegionEvent::Notice { message } => {
                message.channel_id
            }
            LegionEvent::MessageDeleted { channel_id, .. }
            | LegionEvent::MessageDelta { channel_id, .. }
            | LegionEvent::MinionStatus { channel_id, .. }
            | LegionEvent::AutoModeChanged { channel_id, .. } => *channel_id,
        }
    }
}
