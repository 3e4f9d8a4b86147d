use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pooled credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CredentialId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A wrapper that redacts secret values in Debug and Display output.
///
/// The actual value is accessible via `.expose()`. Serialization writes the
/// plain value so the pool can be persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redacted(String);

impl Redacted {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Show masked representation: last 4 chars visible.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 4 {
            "****".to_string()
        } else {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("****{tail}")
        }
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redacted(\"***\")")
    }
}

impl fmt::Display for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// A named API key owned by the credential pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    pub secret: Redacted,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn view(&self) -> CredentialView {
        CredentialView {
            id: self.id,
            name: self.name.clone(),
            masked_secret: self.secret.masked(),
            created_at: self.created_at,
        }
    }
}

/// Credential as shown to callers; never carries the secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialView {
    pub id: CredentialId,
    pub name: String,
    pub masked_secret: String,
    pub created_at: DateTime<Utc>,
}

/// How a credential was chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// The minion is pinned to this credential.
    Assigned,
    /// Picked by the pool's round-robin cursor.
    LoadBalanced,
    /// Nothing usable was available.
    None,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::Assigned => write!(f, "Assigned"),
            SelectionMethod::LoadBalanced => write!(f, "Load Balanced"),
            SelectionMethod::None => write!(f, "None"),
        }
    }
}

/// Result of a pool selection.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySelection {
    pub credential: Option<Credential>,
    pub method: SelectionMethod,
}

impl KeySelection {
    pub fn none() -> Self {
        Self {
            credential: None,
            method: SelectionMethod::None,
        }
    }

    /// Display name of the chosen credential, or "none".
    pub fn label(&self) -> &str {
        self.credential.as_ref().map_or("none", |c| c.name.as_str())
    }
}
