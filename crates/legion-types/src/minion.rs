use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential::CredentialId;
use crate::diary::PerceptionPlan;

/// Opinion score every participant starts from.
pub const DEFAULT_OPINION_SCORE: u8 = 50;

/// Upper bound of the opinion scale.
pub const MAX_OPINION_SCORE: u8 = 100;

/// Unique identifier for a minion, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MinionId(pub Uuid);

impl MinionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MinionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MinionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Opinion scores keyed by participant name.
///
/// A `BTreeMap` keeps the rendered prompt and persisted JSON stable.
pub type OpinionMap = BTreeMap<String, u8>;

/// An autonomous conversational participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minion {
    pub id: MinionId,
    /// Unique participant name; also the key other minions use in their opinion maps.
    pub name: String,
    /// Model identifier passed to the provider (e.g. "gemini-2.5-flash").
    pub model_id: String,
    /// Optional human-friendly model label.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Standing instruction describing who this minion is.
    pub persona: String,
    pub temperature: f64,
    /// Credential this minion is pinned to, if any.
    #[serde(default)]
    pub credential_id: Option<CredentialId>,
    #[serde(default)]
    pub opinions: OpinionMap,
    /// Last structured self-report, `None` before the first perception.
    #[serde(default)]
    pub last_diary: Option<PerceptionPlan>,
    /// Transient activity label. Always reset to idle on load.
    #[serde(default)]
    pub status: MinionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Minion {
    /// Current opinion of `participant`, falling back to the neutral default.
    pub fn opinion_of(&self, participant: &str) -> u8 {
        self.opinions
            .get(participant)
            .copied()
            .unwrap_or(DEFAULT_OPINION_SCORE)
    }
}

/// What a minion is currently doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinionStatus {
    #[default]
    Idle,
    Perceiving,
    Composing,
}

impl fmt::Display for MinionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinionStatus::Idle => write!(f, "idle"),
            MinionStatus::Perceiving => write!(f, "perceiving"),
            MinionStatus::Composing => write!(f, "composing"),
        }
    }
}

/// Request to create a new minion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMinionRequest {
    pub name: String,
    pub model_id: String,
    #[serde(default)]
    pub model_name: Option<String>,
    pub persona: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub credential_id: Option<CredentialId>,
}

pub fn default_temperature() -> f64 {
    0.7
}

/// Partial update of a minion. `None` fields are left untouched.
///
/// `credential_id` uses a nested option so callers can clear a pin with
/// `Some(None)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMinionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, with = "double_option")]
    pub credential_id: Option<Option<CredentialId>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
