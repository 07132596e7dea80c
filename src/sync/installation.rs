use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::clock::Clock;

pub const INSTALLATION_FILE_NAME: &str = "installation.json";

#[derive(Debug, Serialize, Deserialize)]
struct InstallationState {
    install_date: NaiveDate,
}

/// Remembers when the application was first used. Backfill starts from the beginning of that
/// year.
pub struct InstallationTracker {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl InstallationTracker {
    pub fn new(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { path, clock }
    }

    /// The stored installation date. The first call stores today.
    pub async fn get_installation_date(&self) -> Result<NaiveDate> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let state = serde_json::from_str::<InstallationState>(&contents)
                    .with_context(|| format!("Corrupted installation file {:?}", self.path))?;
                Ok(state.install_date)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let today = self.clock.today();
                let state = InstallationState {
                    install_date: today,
                };
                tokio::fs::write(&self.path, serde_json::to_vec(&state)?).await?;
                info!("Recorded installation date {today}");
                Ok(today)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        }
    }

    /// January 1st of the installation year.
    pub async fn get_sync_start_date(&self) -> Result<NaiveDate> {
        let install_date = self.get_installation_date().await?;
        NaiveDate::from_ymd_opt(install_date.year(), 1, 1)
            .with_context(|| format!("No start of year for {install_date}"))
    }

    pub async fn reset_installation_date(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
