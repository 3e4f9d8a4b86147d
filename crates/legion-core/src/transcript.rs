//! Per-channel message log.
//!
//! Messages are unique per `(channel, id)`. Writes are idempotent
//! replacements: upserting a message whose id exists swaps it in place, so a
//! streaming message can be rewritten on every increment without ever
//! producing a duplicate.

use std::collections::HashMap;
use std::sync::RwLock;

use legion_types::channel::ChannelId;
use legion_types::error::LegionError;
use legion_types::message::{ChatMessage, MessageId, SenderKind};

#[derive(Debug, Default)]
pub struct TranscriptStore {
    channels: RwLock<HashMap<ChannelId, Vec<ChatMessage>>>,
}

impl TranscriptStore {
    /// Load transcripts. Anything still streaming was cut off by a restart and
    /// is finalized as an error.
    pub fn new(mut channels: HashMap<ChannelId, Vec<ChatMessage>>) -> Self {
        for message in channels.values_mut().flatten() {
            if message.is_in_progress() {
                let partial = std::mem::take(&mut message.content);
                message.fail(format!("{partial}\n[interrupted]").trim_start().to_string());
            }
        }
        Self {
            channels: RwLock::new(channels),
        }
    }

    /// Every message in a channel, oldest first.
    pub fn list(&self, channel: &ChannelId) -> Vec<ChatMessage> {
        self.channels
            .read()
            .expect("transcript lock poisoned")
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, channel: &ChannelId, id: &MessageId) -> Option<ChatMessage> {
        self.channels
            .read()
            .expect("transcript lock poisoned")
            .get(channel)?
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    /// Insert or replace by id. Returns `true` if an existing message was replaced.
    pub fn upsert(&self, message: ChatMessage) -> bool {
        let mut channels = self.channels.write().expect("transcript lock poisoned");
        let log = channels.entry(message.channel_id).or_default();
        match log.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message;
                true
            }
            None => {
                log.push(message);
                false
            }
        }
    }

    /// Replace the content of a finalized message, keeping id and timestamp.
    pub fn edit(
        &self,
        channel: &ChannelId,
        id: &MessageId,
        content: &str,
    ) -> Result<ChatMessage, LegionError> {
        if content.trim().is_empty() {
            return Err(LegionError::validation("message content cannot be blank"));
        }
        let mut channels = self.channels.write().expect("transcript lock poisoned");
        let message = channels
            .get_mut(channel)
            .and_then(|log| log.iter_mut().find(|m| &m.id == id))
            .ok_or_else(|| LegionError::not_found("message", id))?;
        if message.is_in_progress() {
            return Err(LegionError::validation(
                "cannot edit a message that is still streaming",
            ));
        }
        message.content = content.to_string();
        Ok(message.clone())
    }

    pub fn delete(&self, channel: &ChannelId, id: &MessageId) -> Result<ChatMessage, LegionError> {
        let mut channels = self.channels.write().expect("transcript lock poisoned");
        let log = channels
            .get_mut(channel)
            .ok_or_else(|| LegionError::not_found("message", id))?;
        let index = log
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| LegionError::not_found("message", id))?;
        Ok(log.remove(index))
    }

    /// Drop the oldest messages so at most `keep` remain. Returns how many went.
    pub fn retain_newest(&self, channel: &ChannelId, keep: usize) -> usize {
        let mut channels = self.channels.write().expect("transcript lock poisoned");
        let Some(log) = channels.get_mut(channel) else {
            return 0;
        };
        let excess = log.len().saturating_sub(keep);
        log.drain(..excess);
        excess
    }

    /// Forget a channel's log entirely.
    pub fn drop_channel(&self, channel: &ChannelId) -> usize {
        self.channels
            .write()
            .expect("transcript lock poisoned")
            .remove(channel)
            .map_or(0, |log| log.len())
    }

    /// The last `size` messages that belong in a prompt, oldest first.
    ///
    /// Credential audit entries and still-streaming messages are skipped.
    pub fn window(&self, channel: &ChannelId, size: usize) -> Vec<ChatMessage> {
        let channels = self.channels.read().expect("transcript lock poisoned");
        let Some(log) = channels.get(channel) else {
            return Vec::new();
        };
        let mut window: Vec<ChatMessage> = log
            .iter()
            .rev()
            .filter(|m| !m.is_credential_log && !m.is_in_progress())
            .take(size)
            .cloned()
            .collect();
        window.reverse();
        window
    }

    /// Most recent finalized message authored by the commander or a minion.
    pub fn last_conversational(&self, channel: &ChannelId) -> Option<ChatMessage> {
        self.channels
            .read()
            .expect("transcript lock poisoned")
            .get(channel)?
            .iter()
            .rev()
            .find(|m| {
                m.sender_kind != SenderKind::System && !m.is_in_progress() && !m.is_error()
            })
            .cloned()
    }
}
