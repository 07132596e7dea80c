//! Single place that reads and writes walks.
//!
//! The repository enforces one rule between the two writers of a day:
//!  - Manual writes always apply and are mirrored to the cloud.
//!  - Detected writes apply only to days that aren't in the manual set.
//!
//! Only walked days enter the manual set. Unmarking a day removes it, after which detection may
//! mark it walked again.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::{
    cloud::{mirror::ManualWalkMirror, ManualWalkRecord},
    storage::{entities::WalkEntity, walk_storage::WalkStorage},
    utils::{clock::Clock, time::month_bounds},
};

pub struct WalkRepository<S: WalkStorage> {
    storage: S,
    mirror: Arc<ManualWalkMirror>,
    clock: Arc<dyn Clock>,
    month_cache: HashMap<(i32, u32), Vec<WalkEntity>>,
    manual_walks: BTreeSet<NaiveDate>,
    pending_pushes: JoinSet<()>,
}

impl<S: WalkStorage> WalkRepository<S> {
    /// Restores the manual set from storage.
    pub async fn open(
        storage: S,
        mirror: Arc<ManualWalkMirror>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let manual_walks = storage
            .get_manual_dates()
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>();
        debug!("Loaded {} manual walks", manual_walks.len());

        Ok(Self {
            storage,
            mirror,
            clock,
            month_cache: HashMap::new(),
            manual_walks,
            pending_pushes: JoinSet::new(),
        })
    }

    pub fn mirror(&self) -> &Arc<ManualWalkMirror> {
        &self.mirror
    }

    pub fn is_manual(&self, date: NaiveDate) -> bool {
        self.manual_walks.contains(&date)
    }

    pub async fn get_walks_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WalkEntity>> {
        self.storage.get_walks_in_range(start, end).await
    }

    /// Reads a whole month and remembers it until one of its days is written.
    pub async fn get_walks_for_month(&mut self, year: i32, month: u32) -> Result<Vec<WalkEntity>> {
        let Some((first, last)) = month_bounds(year, month) else {
            anyhow::bail!("Invalid month {year}-{month}");
        };
        let walks = self.storage.get_walks_in_range(first, last).await?;
        self.month_cache.insert((year, month), walks.clone());
        Ok(walks)
    }

    pub fn get_cached_month_data(&self, year: i32, month: u32) -> Option<&[WalkEntity]> {
        self.month_cache.get(&(year, month)).map(Vec::as_slice)
    }

    /// Years with data, always including the current one, most recent first.
    pub async fn get_available_years(&self) -> Result<Vec<i32>> {
        let mut years = self.storage.get_distinct_years().await?;
        let current_year = self.clock.today().year();
        if !years.contains(&current_year) {
            years.push(current_year);
        }
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    /// Days without a record count as not walked.
    pub async fn get_walk_status(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.storage.get_walk_status(date).await?.unwrap_or(false))
    }

    /// Applies a user decision. The cloud copy is updated in the background; call
    /// [Self::flush_pending] to wait for it.
    pub async fn update_manual_walk(&mut self, date: NaiveDate, is_walked: bool) -> Result<()> {
        self.storage
            .upsert_walk(WalkEntity::manual(date, is_walked))
            .await?;
        info!("Updated local walk (manual): {date} = {is_walked}");

        if is_walked {
            self.manual_walks.insert(date);
        } else {
            self.manual_walks.remove(&date);
        }
        self.invalidate(date);

        let mirror = self.mirror.clone();
        self.pending_pushes.spawn(async move {
            if is_walked {
                mirror.sync_manual_walk(date, true).await;
            } else {
                mirror.delete_manual_walk(date).await;
            }
        });
        Ok(())
    }

    /// Applies a detected status unless the user already decided this day. Returns whether the
    /// write happened. Detected walks are never sent to the cloud.
    pub async fn update_walk_from_detector(
        &mut self,
        date: NaiveDate,
        is_walked: bool,
    ) -> Result<bool> {
        if self.manual_walks.contains(&date) {
            debug!("Skipped {date}, it's a manual walk");
            return Ok(false);
        }

        self.storage
            .upsert_walk(WalkEntity::detected(date, is_walked))
            .await?;
        self.invalidate(date);
        info!("Updated from health data: {date} = {is_walked}");
        Ok(true)
    }

    /// Pulls every manual walk of the user and stores it locally.
    pub async fn sync_from_cloud(&mut self) -> Result<usize> {
        info!("Syncing manual walks from the cloud");
        let walks = self.mirror.fetch_all_manual_walks().await;
        let synced = self.apply_cloud_walks(walks).await?;
        info!("Cloud sync complete");
        Ok(synced)
    }

    /// Stores a snapshot of remote manual walks.
    pub async fn apply_cloud_walks(&mut self, walks: Vec<ManualWalkRecord>) -> Result<usize> {
        let count = walks.len();
        for walk in walks {
            if walk.is_walked {
                self.manual_walks.insert(walk.walk_date);
            }
            self.storage
                .upsert_walk(WalkEntity::manual(walk.walk_date, walk.is_walked))
                .await?;
            self.invalidate(walk.walk_date);
            debug!("Synced: {} = {}", walk.walk_date, walk.is_walked);
        }
        Ok(count)
    }

    pub fn is_cloud_logged_in(&self) -> bool {
        self.mirror.is_logged_in()
    }

    /// Waits for background cloud writes.
    pub async fn flush_pending(&mut self) {
        while let Some(result) = self.pending_pushes.join_next().await {
            if let Err(e) = result {
                error!("Cloud push task failed {e:?}");
            }
        }
    }

    fn invalidate(&mut self, date: NaiveDate) {
        self.month_cache.remove(&(date.year(), date.month()));
    }
}
