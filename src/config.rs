//! Application configuration, read from `config.json` inside the application directory.
//! Every field has a default, so a missing file or a partial file is fine.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detector::DetectorConfig;

pub const CONFIG_FILE_NAME: &str = "config.json";
/// Overrides `cloud.api_key` so the key doesn't have to live in the file.
pub const API_KEY_ENV: &str = "LAYZBUG_API_KEY";
pub const DEFAULT_TABLE: &str = "manual_walks";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub sync: SyncConfig,
    pub cloud: Option<CloudConfig>,
    /// Stable identifier of the user in the cloud table. Cloud sync is off without it.
    pub user_id: Option<String>,
    /// Directory with health exports. Defaults to `<app dir>/health`.
    pub health_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pause after each day written during backfill, keeps the health provider responsive.
    pub day_delay_ms: u64,
    /// Upper bound for a whole backfill pass.
    pub backfill_timeout_secs: u64,
    /// How often the remote table is checked for changes while watching.
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            day_delay_ms: 50,
            backfill_timeout_secs: 30,
            poll_interval_secs: 15,
        }
    }
}

impl SyncConfig {
    pub fn day_delay(&self) -> Duration {
        Duration::from_millis(self.day_delay_ms)
    }

    pub fn backfill_timeout(&self) -> Duration {
        Duration::from_secs(self.backfill_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl AppConfig {
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE_NAME);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<AppConfig>(&contents)
                .with_context(|| format!("Invalid configuration in {path:?}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {path:?}, using defaults");
                AppConfig::default()
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {path:?}")),
        };

        if let (Ok(key), Some(cloud)) = (std::env::var(API_KEY_ENV), config.cloud.as_mut()) {
            cloud.api_key = key;
        }
        Ok(config)
    }

    pub fn health_dir(&self, app_dir: &Path) -> PathBuf {
        self.health_dir
            .clone()
            .unwrap_or_else(|| app_dir.join("health"))
    }
}
