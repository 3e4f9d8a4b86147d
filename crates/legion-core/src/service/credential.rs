//! Credential pool management.

use tracing::info;

use legion_types::credential::{CredentialId, CredentialView};
use legion_types::error::LegionError;

use crate::storage::KvStore;

use super::LegionService;

impl<K: KvStore + 'static> LegionService<K> {
    pub fn list_credentials(&self) -> Vec<CredentialView> {
        self.state.credentials.list()
    }

    /// Look a credential up by id or, failing that, by name.
    pub fn find_credential(&self, id_or_name: &str) -> Result<CredentialView, LegionError> {
        let parsed = id_or_name.parse::<CredentialId>().ok();
        self.list_credentials()
            .into_iter()
            .find(|c| Some(c.id) == parsed || c.name == id_or_name)
            .ok_or_else(|| LegionError::not_found("credential", id_or_name))
    }

    pub async fn add_credential(
        &self,
        name: &str,
        secret: &str,
    ) -> Result<CredentialView, LegionError> {
        let credential = self.state.credentials.add(name, secret)?;
        self.state.persist_credentials().await;
        info!(credential = %credential.name, "Credential added");
        Ok(credential.view())
    }

    /// Delete a credential after unpinning every minion that used it.
    pub async fn remove_credential(&self, id: &CredentialId) -> Result<CredentialView, LegionError> {
        if !self.state.credentials.contains(id) {
            return Err(LegionError::not_found("credential", id));
        }
        let unpinned = self.state.roster.clear_pins(id);
        let removed = self.state.credentials.remove(id)?;
        if unpinned > 0 {
            self.state.persist_minions().await;
        }
        self.state.persist_credentials().await;
        info!(credential = %removed.name, unpinned, "Credential removed");
        Ok(removed.view())
    }
}
