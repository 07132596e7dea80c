use std::{
    collections::BTreeMap,
    future::Future,
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{month_to_record_name, record_name_to_month};

use super::entities::WalkEntity;

/// Interface for abstracting storage of walks. Entities are keyed by date.
pub trait WalkStorage {
    /// Walks between `start` and `end` (both inclusive), sorted by date.
    fn get_walks_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<WalkEntity>>>;

    /// `None` when nothing was ever stored for the day.
    fn get_walk_status(&self, date: NaiveDate) -> impl Future<Output = Result<Option<bool>>>;

    /// Inserts the entity or replaces the one stored for the same date.
    fn upsert_walk(&self, walk: WalkEntity) -> impl Future<Output = Result<()>>;

    /// Years that have at least one stored day, most recent first.
    fn get_distinct_years(&self) -> impl Future<Output = Result<Vec<i32>>>;

    /// Dates whose walk was set manually.
    fn get_manual_dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>>>;
}

/// The main realization of [WalkStorage].
pub struct WalkStorageImpl {
    walk_dir: PathBuf,
}

impl WalkStorageImpl {
    pub fn new(walk_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&walk_dir)?;

        Ok(Self { walk_dir })
    }

    fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.walk_dir.join(month_to_record_name(year, month))
    }

    async fn stored_months(&self) -> Result<Vec<(i32, u32)>> {
        let mut months = vec![];
        let mut entries = tokio::fs::read_dir(&self.walk_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().and_then(record_name_to_month) {
                Some(month) => months.push(month),
                None => debug!("Skipping unknown file {name:?}"),
            }
        }
        months.sort();
        Ok(months)
    }

    async fn get_month(&self, year: i32, month: u32) -> Result<Vec<WalkEntity>> {
        async fn extract(path: &Path) -> std::result::Result<Vec<WalkEntity>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut walks = BTreeMap::new();
            while let Ok(Some(v)) = lines.next_line().await {
                if let Some(walk) = parse_line(path, &v) {
                    walks.insert(walk.date, walk);
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(walks.into_values().collect())
        }

        let path = self.month_path(year, month);
        match extract(&path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }

    async fn append_with_file(file: &mut File, walk: WalkEntity) -> Result<()> {
        // Existing lines are never rewritten. Readers keep the last line of each date.
        let len = file.seek(SeekFrom::End(0)).await?;

        let mut line = Vec::<u8>::new();
        if len > 0 {
            // A write cut short by a crash leaves no trailing newline.
            file.seek(SeekFrom::End(-1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.push(b'\n');
            }
        }
        serde_json::to_writer(&mut line, &walk)?;
        line.push(b'\n');

        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

fn parse_line(path: &Path, line: &str) -> Option<WalkEntity> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<WalkEntity>(line) {
        Ok(v) => Some(v),
        Err(e) => {
            // ignore illegal values. Might happen after a crash mid write
            warn!(
                "During parsing in path {:?} found illegal json string {}:  {e}",
                path, line
            );
            None
        }
    }
}

/// Months touched by the inclusive range, in order.
fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = vec![];
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

impl WalkStorage for WalkStorageImpl {
    async fn get_walks_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WalkEntity>> {
        let mut walks = vec![];
        for (year, month) in months_between(start, end) {
            walks.extend(
                self.get_month(year, month)
                    .await?
                    .into_iter()
                    .filter(|v| v.date >= start && v.date <= end),
            );
        }
        Ok(walks)
    }

    async fn get_walk_status(&self, date: NaiveDate) -> Result<Option<bool>> {
        let walks = self.get_month(date.year(), date.month()).await?;
        Ok(walks.iter().find(|v| v.date == date).map(|v| v.walked))
    }

    async fn upsert_walk(&self, walk: WalkEntity) -> Result<()> {
        let path = self.month_path(walk.date.year(), walk.date.month());

        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, walk).await;
        file.unlock_async().await?;
        result
    }

    async fn get_distinct_years(&self) -> Result<Vec<i32>> {
        let mut years = self
            .stored_months()
            .await?
            .into_iter()
            .map(|(year, _)| year)
            .collect::<Vec<_>>();
        years.dedup();
        years.reverse();
        Ok(years)
    }

    async fn get_manual_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = vec![];
        for (year, month) in self.stored_months().await? {
            dates.extend(
                self.get_month(year, month)
                    .await?
                    .into_iter()
                    .filter(|v| v.manual)
                    .map(|v| v.date),
            );
        }
        Ok(dates)
    }
}
