use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TsuzukiError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub presence: PresenceConfig,
}

/// How the external media player is launched and queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player executable, resolved through `PATH` when not absolute.
    pub executable: String,
    /// Extra arguments appended before the media target.
    pub extra_args: Vec<String>,
    /// Upper bound for one IPC request/reply round trip.
    pub ipc_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    pub enabled: bool,
    /// Discord application ID shown as "Watching <app name>".
    pub application_id: String,
    /// Sampling cadence of the presence sync loop.
    pub update_interval_ms: u64,
    /// Minimum seek distance that forces a republish while playing.
    pub drift_threshold_secs: f64,
    /// Unconditional republish period, keeps the remote presence alive.
    pub force_refresh_secs: u64,
    /// Asset key used when the episode has no artwork.
    pub fallback_image: String,
    pub paused_image: String,
    pub paused_text: String,
}

impl PlayerConfig {
    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms.max(1))
    }
}

impl PresenceConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    pub fn force_refresh(&self) -> Duration {
        Duration::from_secs(self.force_refresh_secs)
    }
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, TsuzukiError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, merged over built-in defaults.
    pub fn load_from(user_path: &Path) -> Result<Self, TsuzukiError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| TsuzukiError::Config(e.to_string()))?;

        if user_path.exists() {
            let user_str = std::fs::read_to_string(user_path)?;
            let user: toml::Table = toml::from_str(&user_str)
                .map_err(|e| TsuzukiError::Config(format!("{}: {e}", user_path.display())))?;
            merge_tables(&mut merged, user);
            tracing::debug!(path = %user_path.display(), "Loaded user config");
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| TsuzukiError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<PathBuf, TsuzukiError> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TsuzukiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TsuzukiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_local_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "tsuzuki")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `overlay` onto `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
