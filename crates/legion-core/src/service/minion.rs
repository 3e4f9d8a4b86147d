//! Minion management.

use tracing::info;

use legion_types::error::LegionError;
use legion_types::minion::{CreateMinionRequest, Minion, MinionId, UpdateMinionRequest};

use crate::storage::KvStore;

use super::LegionService;

impl<K: KvStore + 'static> LegionService<K> {
    pub fn list_minions(&self) -> Vec<Minion> {
        self.state.roster.list()
    }

    pub fn get_minion(&self, id: &MinionId) -> Result<Minion, LegionError> {
        self.state
            .roster
            .get(id)
            .ok_or_else(|| LegionError::not_found("minion", id))
    }

    /// Look a minion up by id or, failing that, by name (case-insensitive).
    pub fn find_minion(&self, id_or_name: &str) -> Result<Minion, LegionError> {
        if let Ok(id) = id_or_name.parse::<MinionId>() {
            return self.get_minion(&id);
        }
        self.list_minions()
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(id_or_name))
            .ok_or_else(|| LegionError::not_found("minion", id_or_name))
    }

    /// Create a minion. Every existing minion starts with a neutral opinion of
    /// it, and it starts neutral toward the commander and everyone else.
    pub async fn add_minion(&self, request: CreateMinionRequest) -> Result<Minion, LegionError> {
        let state = &self.state;
        let minion = state.roster.add(request, state.commander(), |id| {
            state.credentials.contains(id)
        })?;
        state.persist_minions().await;
        info!(minion = %minion.name, model = %minion.model_id, "Minion added");
        Ok(minion)
    }

    /// Partially update a minion. A rename follows through to opinion keys
    /// and channel memberships.
    pub async fn update_minion(
        &self,
        id: &MinionId,
        request: UpdateMinionRequest,
    ) -> Result<Minion, LegionError> {
        let state = &self.state;
        let (minion, rename) = state.roster.update(id, request, state.commander(), |cred| {
            state.credentials.contains(cred)
        })?;
        if let Some(rename) = rename {
            info!(from = %rename.from, to = %rename.to, "Minion renamed");
            if state.channels.rename_member(&rename.from, &rename.to) {
                state.persist_channels().await;
            }
        }
        state.persist_minions().await;
        Ok(minion)
    }

    /// Remove a minion from the roster, every opinion map, and every channel.
    pub async fn remove_minion(&self, id: &MinionId) -> Result<Minion, LegionError> {
        let removed = self.state.roster.remove(id)?;
        if self.state.channels.remove_member(&removed.name) {
            self.state.persist_channels().await;
        }
        self.state.persist_minions().await;
        info!(minion = %removed.name, "Minion removed");
        Ok(removed)
    }
}
