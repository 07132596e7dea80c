//! Keeps local walks in line with health data and the cloud.
//!
//! A sync pass is strictly sequential: pull manual walks from the cloud (when logged in), then
//! walk day by day from the start of the installation year to today asking the health provider
//! about each day. Every day is written as soon as it's known, so a pass cut short by the timeout
//! or by the process ending keeps what it already found.

use std::{pin::pin, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::SyncConfig,
    health::goal::GoalChecker,
    repository::WalkRepository,
    storage::walk_storage::WalkStorage,
    utils::{clock::Clock, time::date_range},
};

pub mod installation;

use installation::InstallationTracker;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// The initial sync already ran for this coordinator.
    pub skipped: bool,
    pub cloud_walks: usize,
    pub permissions_missing: bool,
    pub days_checked: usize,
    pub walks_detected: usize,
    pub timed_out: bool,
}

#[derive(Debug, Default)]
struct BackfillProgress {
    permissions_missing: bool,
    days_checked: usize,
    walks_detected: usize,
}

pub struct SyncCoordinator<S: WalkStorage> {
    repository: WalkRepository<S>,
    checker: GoalChecker,
    installation: InstallationTracker,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    initial_sync_completed: bool,
}

impl<S: WalkStorage> SyncCoordinator<S> {
    pub fn new(
        repository: WalkRepository<S>,
        checker: GoalChecker,
        installation: InstallationTracker,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repository,
            checker,
            installation,
            clock,
            config,
            initial_sync_completed: false,
        }
    }

    pub fn repository(&self) -> &WalkRepository<S> {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut WalkRepository<S> {
        &mut self.repository
    }

    pub fn checker(&self) -> &GoalChecker {
        &self.checker
    }

    pub fn installation(&self) -> &InstallationTracker {
        &self.installation
    }

    /// Runs cloud pull and backfill once. Never fails, problems end up in the log and the report.
    #[instrument(skip(self))]
    pub async fn start_initial_sync(&mut self) -> SyncReport {
        if self.initial_sync_completed {
            info!("Skipping sync, already completed");
            return SyncReport {
                skipped: true,
                ..Default::default()
            };
        }

        let mut report = SyncReport::default();
        if self.repository.is_cloud_logged_in() {
            info!("Cloud is active, syncing manual walks");
            match self.repository.sync_from_cloud().await {
                Ok(synced) => report.cloud_walks = synced,
                Err(e) => error!("Cloud sync failed {e:?}"),
            }
        } else {
            info!("Not logged in, syncing from health data only");
        }

        let timeout = self.config.backfill_timeout();
        let mut progress = BackfillProgress::default();
        match tokio::time::timeout(timeout, self.backfill(&mut progress)).await {
            Ok(Ok(())) => {
                self.initial_sync_completed = true;
                info!("Initial sync complete");
            }
            Ok(Err(e)) => error!("Sync failed {e:?}"),
            Err(_) => {
                report.timed_out = true;
                warn!("Backfill timed out after {timeout:?}, keeping partial progress");
            }
        }

        report.permissions_missing = progress.permissions_missing;
        report.days_checked = progress.days_checked;
        report.walks_detected = progress.walks_detected;
        report
    }

    async fn backfill(&mut self, progress: &mut BackfillProgress) -> Result<()> {
        if !self.checker.has_permissions().await {
            warn!("Aborting sync, permissions not granted");
            progress.permissions_missing = true;
            return Ok(());
        }

        let start = self.installation.get_sync_start_date().await?;
        let today = self.clock.today();
        info!("Syncing days from {start} to {today}");

        let mut dates = pin!(date_range(start, today));
        while let Some(date) = dates.next().await {
            progress.days_checked += 1;
            match self.sync_day(date).await {
                Ok(true) => {
                    progress.walks_detected += 1;
                    self.clock.sleep(self.config.day_delay()).await;
                }
                Ok(false) => (),
                Err(e) => error!("Error syncing {date}: {e:?}"),
            }
        }

        info!("Synced {} new walks from health data", progress.walks_detected);
        Ok(())
    }

    /// Returns whether a new walk was written.
    async fn sync_day(&mut self, date: NaiveDate) -> Result<bool> {
        if self.repository.get_walk_status(date).await? {
            return Ok(false);
        }
        if !self.checker.check_walking_goal(date).await {
            return Ok(false);
        }
        self.repository.update_walk_from_detector(date, true).await
    }

    /// Applies remote changes until the change stream ends or `shutdown` fires. Each event
    /// triggers a full refetch of the user's manual walks.
    #[instrument(skip_all)]
    pub async fn watch_cloud(&mut self, shutdown: CancellationToken) {
        if !self.repository.is_cloud_logged_in() {
            warn!("Not logged in, skipping cloud listener");
            return;
        }

        let mirror = self.repository.mirror().clone();
        let mut changes = mirror.observe_manual_walks().await;
        loop {
            tokio::select! {
                // Cancelling the subscription also stops whatever produces the events.
                _ = shutdown.cancelled() => {
                    changes.cancel();
                    return;
                }
                event = changes.next() => {
                    let Some(event) = event else {
                        info!("Cloud change stream ended");
                        return;
                    };
                    debug!("Cloud update observed at {}", event.observed_at);
                    let walks = mirror.fetch_all_manual_walks().await;
                    match self.repository.apply_cloud_walks(walks).await {
                        Ok(count) => info!("Cloud update: {count} manual walks"),
                        Err(e) => error!("Failed to apply cloud update {e:?}"),
                    }
                }
            }
        }
    }

    /// Flips a day on behalf of the user.
    pub async fn toggle_day(&mut self, date: NaiveDate, current_status: bool) -> Result<()> {
        self.repository
            .update_manual_walk(date, !current_status)
            .await
    }
}
