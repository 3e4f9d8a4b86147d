//! Channel types.
//!
//! A channel is a named message stream with an ordered member list and a
//! kind that governs who may post and whether the autonomous loop applies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Participation rules for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Commander and minions talk together; every message triggers a multi-speaker batch.
    #[default]
    Group,
    /// Minions talk among themselves on a timer once autonomous mode is started.
    AutonomousSwarm,
    /// Read-only stream of audit records and diagnostics.
    SystemLog,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Group => write!(f, "group"),
            ChannelKind::AutonomousSwarm => write!(f, "autonomous_swarm"),
            ChannelKind::SystemLog => write!(f, "system_log"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "group" => Ok(ChannelKind::Group),
            "autonomous_swarm" | "swarm" => Ok(ChannelKind::AutonomousSwarm),
            "system_log" | "log" => Ok(ChannelKind::SystemLog),
            other => Err(format!("invalid channel kind: '{other}'")),
        }
    }
}

/// How long the autonomous loop waits between batches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoModeDelay {
    Fixed { seconds: f64 },
    Random { min_seconds: f64, max_seconds: f64 },
}

impl Default for AutoModeDelay {
    fn default() -> Self {
        AutoModeDelay::Fixed { seconds: 5.0 }
    }
}

/// Longest wait the autonomous loop accepts between batches (one day).
pub const MAX_AUTO_MODE_DELAY_SECONDS: f64 = 86_400.0;

fn delay_in_range(seconds: f64) -> bool {
    seconds.is_finite() && (0.0..=MAX_AUTO_MODE_DELAY_SECONDS).contains(&seconds)
}

impl AutoModeDelay {
    /// Check the policy is usable: within `0..=MAX_AUTO_MODE_DELAY_SECONDS`
    /// and `min <= max`.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            AutoModeDelay::Fixed { seconds } => {
                if !delay_in_range(seconds) {
                    return Err(format!(
                        "fixed delay must be between 0 and {MAX_AUTO_MODE_DELAY_SECONDS} seconds, got {seconds}"
                    ));
                }
            }
            AutoModeDelay::Random {
                min_seconds,
                max_seconds,
            } => {
                if !delay_in_range(min_seconds) || !delay_in_range(max_seconds) {
                    return Err(format!(
                        "random delay bounds must be between 0 and {MAX_AUTO_MODE_DELAY_SECONDS} seconds"
                    ));
                }
                if min_seconds > max_seconds {
                    return Err(format!(
                        "random delay min ({min_seconds}) exceeds max ({max_seconds})"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Draw the next delay. `unit` is a uniform sample in `[0, 1)`.
    ///
    /// Taking the sample as a parameter keeps this crate free of an RNG
    /// dependency; the scheduler supplies it at schedule time. Values stored
    /// before validation was tightened are clamped into range.
    pub fn draw(&self, unit: f64) -> Duration {
        let seconds = match *self {
            AutoModeDelay::Fixed { seconds } => seconds,
            AutoModeDelay::Random {
                min_seconds,
                max_seconds,
            } => min_seconds + (max_seconds - min_seconds) * unit.clamp(0.0, 1.0),
        };
        // `max`/`min` also map NaN to 0.
        let seconds = seconds.max(0.0).min(MAX_AUTO_MODE_DELAY_SECONDS);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
    }
}

/// A named message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ChannelKind,
    /// Ordered minion names. Always empty for system-log channels.
    #[serde(default)]
    pub members: Vec<String>,
    /// Whether the autonomous loop is running for this channel.
    #[serde(default)]
    pub auto_mode_active: bool,
    #[serde(default)]
    pub auto_mode_delay: AutoModeDelay,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    /// Whether a human may post into this channel.
    pub fn is_postable(&self) -> bool {
        self.kind != ChannelKind::SystemLog
    }
}

/// Request to create a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub auto_mode_delay: Option<AutoModeDelay>,
}

/// Partial update of a channel. Autonomous mode is toggled separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChannelRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: Option<ChannelKind>,
    #[serde(default)]
    pub members: Option<Vec<String>>,
    #[serde(default)]
    pub auto_mode_delay: Option<AutoModeDelay>,
}
