//! Credential pool with per-minion pinning and round-robin load balancing.
//!
//! The round-robin cursor is the one counter shared by every concurrent
//! perception call, so it lives here as an owned `AtomicUsize` and is only
//! reachable through [`CredentialPool::select`].

use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;

use legion_types::credential::{
    Credential, CredentialId, CredentialView, KeySelection, Redacted, SelectionMethod,
};
use legion_types::error::LegionError;

#[derive(Debug, Default)]
pub struct CredentialPool {
    credentials: RwLock<Vec<Credential>>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials: RwLock::new(credentials),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Add a named credential. Both name and secret must be non-blank.
    pub fn add(&self, name: &str, secret: &str) -> Result<Credential, LegionError> {
        let name = name.trim();
        let secret = secret.trim();
        if name.is_empty() {
            return Err(LegionError::validation("credential name cannot be blank"));
        }
        if secret.is_empty() {
            return Err(LegionError::validation("credential secret cannot be blank"));
        }

        let credential = Credential {
            id: CredentialId::new(),
            name: name.to_string(),
            secret: Redacted::new(secret),
            created_at: Utc::now(),
        };
        self.credentials
            .write()
            .expect("credential pool lock poisoned")
            .push(credential.clone());
        Ok(credential)
    }

    /// Delete a credential. Callers clear minion pins first.
    pub fn remove(&self, id: &CredentialId) -> Result<Credential, LegionError> {
        let mut credentials = self.credentials.write().expect("credential pool lock poisoned");
        let index = credentials
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| LegionError::not_found("credential", id))?;
        Ok(credentials.remove(index))
    }

    pub fn contains(&self, id: &CredentialId) -> bool {
        self.credentials
            .read()
            .expect("credential pool lock poisoned")
            .iter()
            .any(|c| &c.id == id)
    }

    pub fn len(&self) -> usize {
        self.credentials.read().expect("credential pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Credentials as shown to callers, secrets masked.
    pub fn list(&self) -> Vec<CredentialView> {
        self.credentials
            .read()
            .expect("credential pool lock poisoned")
            .iter()
            .map(Credential::view)
            .collect()
    }

    /// Full credentials, for persistence.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.credentials.read().expect("credential pool lock poisoned").clone()
    }

    /// Pick a credential for one model call.
    ///
    /// A pin that still resolves wins. Otherwise the cursor picks the next
    /// credential in insertion order and advances, wrapping at the pool size.
    pub fn select(&self, pinned: Option<&CredentialId>) -> KeySelection {
        let credentials = self.credentials.read().expect("credential pool lock poisoned");

        if let Some(found) = pinned.and_then(|id| credentials.iter().find(|c| &c.id == id)) {
            return KeySelection {
                credential: Some(found.clone()),
                method: SelectionMethod::Assigned,
            };
        }

        let len = credentials.len();
        if len == 0 {
            return KeySelection::none();
        }

        // fetch_update returns the pre-advance value; the closure always yields Some.
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c % len + 1) % len))
            .unwrap_or_else(|c| c);

        KeySelection {
            credential: Some(credentials[previous % len].clone()),
            method: SelectionMethod::LoadBalanced,
        }
    }
}
