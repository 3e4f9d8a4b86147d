//! Channel management.

use tracing::info;

use legion_types::channel::{Channel, ChannelId, CreateChannelRequest, UpdateChannelRequest};
use legion_types::error::LegionError;
use legion_types::event::LegionEvent;

use crate::storage::KvStore;

use super::LegionService;

impl<K: KvStore + 'static> LegionService<K> {
    pub fn list_channels(&self) -> Vec<Channel> {
        self.state.channels.list()
    }

    pub fn get_channel(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        self.state.channels.get(id)
    }

    /// Look a channel up by id or, failing that, by name.
    pub fn find_channel(&self, id_or_name: &str) -> Result<Channel, LegionError> {
        if let Ok(id) = id_or_name.parse::<ChannelId>() {
            return self.get_channel(&id);
        }
        let wanted = id_or_name.trim_start_matches('#');
        self.list_channels()
            .into_iter()
            .find(|c| c.name == wanted)
            .ok_or_else(|| LegionError::not_found("channel", id_or_name))
    }

    pub async fn add_channel(&self, request: CreateChannelRequest) -> Result<Channel, LegionError> {
        let roster = &self.state.roster;
        let channel = self
            .state
            .channels
            .add(request, |name| roster.contains_name(name))?;
        self.state.persist_channels().await;
        info!(channel = %channel.name, kind = ?channel.kind, "Channel added");
        Ok(channel)
    }

    /// Partially update a channel. Delay edits apply from the next autonomous
    /// cycle; leaving the swarm kind stops the loop.
    pub async fn update_channel(
        &self,
        id: &ChannelId,
        request: UpdateChannelRequest,
    ) -> Result<Channel, LegionError> {
        let was_active = self.state.channels.is_auto_active(id);
        let roster = &self.state.roster;
        let channel = self
            .state
            .channels
            .update(id, request, |name| roster.contains_name(name))?;
        if was_active && !channel.auto_mode_active {
            self.autonomous.disarm(id);
            self.state.events.publish(LegionEvent::AutoModeChanged {
                channel_id: *id,
                active: false,
            });
        }
        self.state.persist_channels().await;
        Ok(channel)
    }

    /// Remove a channel with its transcript, cancelling any pending autonomous batch.
    pub async fn remove_channel(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        let removed = self.state.channels.remove(id)?;
        self.autonomous.disarm(id);
        self.state.forget_messages(id).await;
        self.state.persist_channels().await;
        info!(channel = %removed.name, "Channel removed");
        Ok(removed)
    }
}
