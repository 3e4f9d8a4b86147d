//! Global configuration types.
//!
//! `LegionConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegionConfig {
    /// Participant name of the human operator.
    #[serde(default = "default_commander_name")]
    pub commander_name: String,

    /// How many recent messages perception and response prompts see.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Create a group channel and a system-log channel when none exist.
    #[serde(default = "default_true")]
    pub seed_default_channels: bool,

    /// Newest entries kept in each system-log channel. `0` keeps everything.
    #[serde(default = "default_system_log_retention")]
    pub system_log_retention: usize,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

fn default_commander_name() -> String {
    "Steven".to_string()
}

fn default_history_window() -> usize {
    15
}

fn default_system_log_retention() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Default for LegionConfig {
    fn default() -> Self {
        Self {
            commander_name: default_commander_name(),
            history_window: default_history_window(),
            seed_default_channels: true,
            system_log_retention: default_system_log_retention(),
            provider: ProviderSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Settings for the OpenAI-compatible model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when a minion is created without one.
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
