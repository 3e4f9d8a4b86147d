//! Channel message types.
//!
//! A message is keyed by `(channel_id, id)`. While a minion is streaming,
//! its message sits in [`MessageState::Streaming`] and is replaced in place
//! on every increment; once finalized or errored its content is history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ChannelId;
use crate::diary::PerceptionPlan;

/// Sender name used for engine-authored notices.
pub const SYSTEM_SENDER_NAME: &str = "LegionOS";

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Commander,
    Minion,
    System,
}

/// Lifecycle of a message: `Streaming -> Finalized | Errored`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Streaming,
    #[default]
    Finalized,
    Errored,
}

/// A single message in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_kind: SenderKind,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub state: MessageState,
    /// Perception plan that led to this message. Only on finalized minion messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diary: Option<PerceptionPlan>,
    /// Marks credential-usage audit entries.
    #[serde(default)]
    pub is_credential_log: bool,
}

impl ChatMessage {
    fn build(
        channel_id: ChannelId,
        sender_kind: SenderKind,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        state: MessageState,
    ) -> Self {
        Self {
            id: MessageId::new(),
            channel_id,
            sender_kind,
            sender_name: sender_name.into(),
            content: content.into(),
            created_at: Utc::now(),
            state,
            diary: None,
            is_credential_log: false,
        }
    }

    pub fn commander(channel_id: ChannelId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(channel_id, SenderKind::Commander, name, content, MessageState::Finalized)
    }

    /// An empty placeholder a minion streams into.
    pub fn streaming(channel_id: ChannelId, minion_name: impl Into<String>) -> Self {
        Self::build(channel_id, SenderKind::Minion, minion_name, String::new(), MessageState::Streaming)
    }

    pub fn system(channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self::build(channel_id, SenderKind::System, SYSTEM_SENDER_NAME, content, MessageState::Finalized)
    }

    /// A system diagnostic flagged as an error.
    pub fn system_error(channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self::build(channel_id, SenderKind::System, SYSTEM_SENDER_NAME, content, MessageState::Errored)
    }

    /// A credential-usage audit entry.
    pub fn credential_log(channel_id: ChannelId, content: impl Into<String>) -> Self {
        let mut message = Self::system(channel_id, content);
        message.is_credential_log = true;
        message
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == MessageState::Streaming
    }

    pub fn is_error(&self) -> bool {
        self.state == MessageState::Errored
    }

    /// Complete a streaming message with its final text and provenance.
    pub fn finalize(&mut self, content: impl Into<String>, diary: Option<PerceptionPlan>) {
        self.content = content.into();
        self.diary = diary;
        self.state = MessageState::Finalized;
    }

    /// Complete a streaming message as an error carrying `error`.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.content = error.into();
        self.diary = None;
        self.state = MessageState::Errored;
    }
}
