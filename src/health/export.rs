use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use crate::{
    detector::signals::{ExerciseSession, StepBucket},
    utils::time::date_range,
};

use super::HealthProvider;

/// Step count over an arbitrary interval, as recorded by a phone or a watch.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct StepRecord {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u32,
}

impl StepRecord {
    /// Spreads the count evenly over every minute the record touches. Leftover steps go to the
    /// earliest minutes. Only buckets overlapping `[window_start, window_end)` are produced, and
    /// a record ending before it starts yields nothing.
    pub fn split_into_minutes(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<StepBucket> {
        if self.end < self.start {
            warn!("Skipping step record that ends before it starts at {}", self.start);
            return vec![];
        }

        let first = self
            .start
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(self.start);
        let minutes = (((self.end - first).num_seconds() + 59) / 60).max(1);

        let count = i64::from(self.count);
        let base = count / minutes;
        let remainder = count % minutes;

        let from = (window_start - first).num_minutes().clamp(0, minutes);
        let to = ((window_end - first).num_seconds() + 59)
            .div_euclid(60)
            .clamp(0, minutes);

        (from..to)
            .map(|i| StepBucket {
                start: first + Duration::minutes(i),
                count: (base + i64::from(i < remainder)) as u32,
            })
            .filter(|bucket| bucket.count > 0)
            .collect()
    }
}

/// Contents of one export file.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct HealthExportDay {
    #[serde(default)]
    pub exercise_sessions: Vec<ExerciseSession>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// Reads health data exported as one JSON file per day (`YYYY-MM-DD.json`).
/// Queries read the neighbouring days too, since records near midnight may have been exported
/// into either file depending on the time zone of the exporter.
pub struct ExportHealthProvider {
    export_dir: PathBuf,
}

impl ExportHealthProvider {
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }

    pub fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.export_dir
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    async fn read_day(&self, date: NaiveDate) -> Result<HealthExportDay> {
        async fn extract(path: &Path) -> std::result::Result<String, std::io::Error> {
            debug!("Extracting {path:?}");
            let mut file = File::open(path).await?;
            file.lock_shared()?;
            let mut contents = String::new();
            let result = file.read_to_string(&mut contents).await;
            file.unlock_async().await?;
            result.map(|_| contents)
        }

        let path = self.day_file(date);
        match extract(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Malformed health export {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HealthExportDay::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read health export {path:?}")),
        }
    }

    async fn read_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthExportDay>> {
        let first = start.date_naive().pred_opt().unwrap_or(start.date_naive());
        let last = end.date_naive().succ_opt().unwrap_or(end.date_naive());

        date_range(first, last)
            .map(|day| self.read_day(day))
            .buffered(4)
            .try_collect()
            .await
    }
}

#[async_trait]
impl HealthProvider for ExportHealthProvider {
    async fn has_permissions(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.export_dir).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_exercise_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExerciseSession>> {
        let mut sessions = self
            .read_range(start, end)
            .await?
            .into_iter()
            .flat_map(|day| day.exercise_sessions)
            .filter(|session| session.start < end && session.end > start)
            .collect::<Vec<_>>();
        sessions.sort();
        sessions.dedup();
        Ok(sessions)
    }

    async fn read_step_buckets(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StepBucket>> {
        let mut minutes = BTreeMap::<DateTime<Utc>, u32>::new();
        for day in self.read_range(start, end).await? {
            for bucket in day
                .steps
                .iter()
                .flat_map(|record| record.split_into_minutes(start, end))
            {
                if bucket.start >= start && bucket.start < end {
                    let entry = minutes.entry(bucket.start).or_default();
                    *entry = entry.saturating_add(bucket.count);
                }
            }
        }

        Ok(minutes
            .into_iter()
            .map(|(start, count)| StepBucket { start, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        detector::signals::ExerciseSession,
        health::HealthProvider,
    };

    use super::{ExportHealthProvider, HealthExportDay, StepRecord};

    fn write_day(provider: &ExportHealthProvider, date: NaiveDate, day: &HealthExportDay) {
        std::fs::write(provider.day_file(date), serde_json::to_string(day).unwrap()).unwrap();
    }

    #[test]
    fn test_split_record_evenly() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap();
        let record = StepRecord {
            start,
            end: start + Duration::minutes(3),
            count: 100,
        };

        let buckets = record.split_into_minutes(start, start + Duration::days(1));

        assert_eq!(
            buckets.iter().map(|b| b.count).collect::<Vec<_>>(),
            vec![34, 33, 33]
        );
        assert_eq!(buckets[2].start, start + Duration::minutes(2));
    }

    #[test]
    fn test_split_unaligned_record() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 30).unwrap();
        let record = StepRecord {
            start,
            end: start + Duration::seconds(20),
            count: 12,
        };

        let buckets =
            record.split_into_minutes(start - Duration::hours(1), start + Duration::hours(1));

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].start, Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap());
        assert_eq!(buckets[0].count, 12);
    }

    #[test]
    fn test_split_only_inside_window() {
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let minutes = 20 * 365 * 24 * 60;
        let record = StepRecord {
            start,
            end: start + Duration::minutes(minutes),
            count: (minutes * 2 + 3) as u32,
        };
        let window = Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap();

        let buckets = record.split_into_minutes(window, window + Duration::minutes(100));
        assert_eq!(buckets.len(), 100);
        assert_eq!(buckets[0].start, window);
        assert!(buckets.iter().all(|b| b.count == 2));

        let head =
            record.split_into_minutes(start - Duration::days(1), start + Duration::minutes(4));
        assert_eq!(
            head.iter().map(|b| b.count).collect::<Vec<_>>(),
            vec![3, 3, 3, 2]
        );

        let outside =
            record.split_into_minutes(start - Duration::days(2), start - Duration::days(1));
        assert!(outside.is_empty());
    }

    #[test]
    fn test_split_rejects_inverted_record() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap();
        let record = StepRecord {
            start,
            end: start - Duration::minutes(5),
            count: 40,
        };
        assert!(record
            .split_into_minutes(start - Duration::days(1), start + Duration::days(1))
            .is_empty());
    }

    #[tokio::test]
    async fn test_permissions_follow_directory() -> Result<()> {
        let dir = tempdir()?;
        let provider = ExportHealthProvider::new(dir.path().to_owned());
        assert!(provider.has_permissions().await?);

        let missing = ExportHealthProvider::new(dir.path().join("missing"));
        assert!(!missing.has_permissions().await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_window_only() -> Result<()> {
        let dir = tempdir()?;
        let provider = ExportHealthProvider::new(dir.path().to_owned());
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);

        write_day(
            &provider,
            date,
            &HealthExportDay {
                exercise_sessions: vec![ExerciseSession {
                    start: start + Duration::hours(7),
                    end: start + Duration::hours(8),
                    kind: Some("walking".into()),
                }],
                steps: vec![
                    StepRecord {
                        start: start + Duration::hours(7),
                        end: start + Duration::hours(7) + Duration::minutes(2),
                        count: 120,
                    },
                    StepRecord {
                        start: start + Duration::hours(7),
                        end: start + Duration::hours(7) + Duration::minutes(1),
                        count: 10,
                    },
                ],
            },
        );
        write_day(
            &provider,
            date.succ_opt().unwrap(),
            &HealthExportDay {
                exercise_sessions: vec![ExerciseSession {
                    start: end + Duration::hours(1),
                    end: end + Duration::hours(2),
                    kind: None,
                }],
                steps: vec![StepRecord {
                    start: end + Duration::minutes(5),
                    end: end + Duration::minutes(6),
                    count: 500,
                }],
            },
        );

        let sessions = provider.read_exercise_sessions(start, end).await?;
        assert_eq!(sessions.len(), 1);

        let buckets = provider.read_step_buckets(start, end).await?;
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 70);
        assert_eq!(buckets[1].count, 60);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_day_is_empty_and_malformed_day_fails() -> Result<()> {
        let dir = tempdir()?;
        let provider = ExportHealthProvider::new(dir.path().to_owned());
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);

        assert!(provider.read_step_buckets(start, end).await?.is_empty());

        std::fs::write(
            provider.day_file(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
            "{ not json",
        )?;
        assert!(provider.read_step_buckets(start, end).await.is_err());
        Ok(())
    }
}
