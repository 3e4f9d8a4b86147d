//! Configuration loading and data-directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.legion/` by default) into
//! [`LegionConfig`], falling back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use legion_types::config::LegionConfig;

pub const DATA_DIR_ENV: &str = "LEGION_DATA_DIR";
pub const COMMANDER_NAME_ENV: &str = "LEGION_COMMANDER_NAME";

/// Resolve the data directory.
///
/// Priority:
/// 1. `LEGION_DATA_DIR`
/// 2. `~/.legion`
/// 3. `./.legion` when no home directory is known
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".legion");
    }
    PathBuf::from(".legion")
}

/// Load `{data_dir}/config.toml`, then apply environment overrides.
pub async fn load_config(data_dir: &Path) -> LegionConfig {
    let config = read_config_file(data_dir).await;
    apply_overrides(config, |name| std::env::var(name).ok())
}

async fn read_config_file(data_dir: &Path) -> LegionConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return LegionConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return LegionConfig::default();
        }
    };

    match toml::from_str::<LegionConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            LegionConfig::default()
        }
    }
}

fn apply_overrides(mut config: LegionConfig, env: impl Fn(&str) -> Option<String>) -> LegionConfig {
    if let Some(name) = env(COMMANDER_NAME_ENV) {
        let name = name.trim();
        if name.is_empty() {
            tracing::warn!("{COMMANDER_NAME_ENV} is blank, keeping '{}'", config.commander_name);
        } else {
            config.commander_name = name.to_string();
        }
    }
    config
}
