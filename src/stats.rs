//! Summaries shown by the `week`, `month` and `history` commands.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Datelike, Days, Month, NaiveDate};

use crate::{
    repository::WalkRepository,
    storage::{entities::WalkEntity, walk_storage::WalkStorage},
    utils::time::month_bounds,
};

pub const YEARLY_LABEL: &str = "Yearly";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsValue {
    pub value: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekDay {
    pub date: NaiveDate,
    /// Short weekday name, `Mon`.
    pub label: String,
    pub walked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub walked: bool,
    pub manual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthStats {
    pub year: i32,
    pub month: u32,
    /// Three letter month name, `Jan`.
    pub month_name: String,
    pub walk_count: usize,
    /// Months in the future can't be opened.
    pub enabled: bool,
}

fn count_walked(walks: &[WalkEntity]) -> usize {
    walks.iter().filter(|walk| walk.walked).count()
}

fn month_name(month: u32) -> Result<&'static str> {
    let month = u8::try_from(month)
        .ok()
        .and_then(|month| Month::try_from(month).ok())
        .with_context(|| format!("Invalid month {month}"))?;
    Ok(month.name())
}

/// Walked days of a whole year.
pub async fn yearly_walks<S: WalkStorage>(
    repository: &WalkRepository<S>,
    year: i32,
) -> Result<StatsValue> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).with_context(|| format!("Invalid year {year}"))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31).with_context(|| format!("Invalid year {year}"))?;
    let walks = repository.get_walks_in_range(start, end).await?;
    Ok(StatsValue {
        value: count_walked(&walks),
        label: YEARLY_LABEL.to_string(),
    })
}

/// Walked days of a month, labelled with the full month name.
pub async fn month_walks<S: WalkStorage>(
    repository: &mut WalkRepository<S>,
    year: i32,
    month: u32,
) -> Result<StatsValue> {
    let label = month_name(month)?.to_string();
    let walks = repository.get_walks_for_month(year, month).await?;
    Ok(StatsValue {
        value: count_walked(&walks),
        label,
    })
}

/// The seven days ending with `today`.
pub async fn weekly_days<S: WalkStorage>(
    repository: &WalkRepository<S>,
    today: NaiveDate,
) -> Result<Vec<WeekDay>> {
    let start = today
        .checked_sub_days(Days::new(6))
        .with_context(|| format!("No week before {today}"))?;
    let walked = repository
        .get_walks_in_range(start, today)
        .await?
        .into_iter()
        .map(|walk| (walk.date, walk.walked))
        .collect::<HashMap<_, _>>();

    Ok(start
        .iter_days()
        .take(7)
        .map(|date| WeekDay {
            date,
            label: date.format("%a").to_string(),
            walked: walked.get(&date).copied().unwrap_or(false),
        })
        .collect())
}

/// Every day of the month, days without a record are not walked.
pub async fn calendar_days<S: WalkStorage>(
    repository: &mut WalkRepository<S>,
    year: i32,
    month: u32,
) -> Result<Vec<CalendarDay>> {
    let (first, last) =
        month_bounds(year, month).with_context(|| format!("Invalid month {year}-{month}"))?;
    let walks = repository
        .get_walks_for_month(year, month)
        .await?
        .into_iter()
        .map(|walk| (walk.date, walk))
        .collect::<HashMap<_, _>>();

    Ok(first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| {
            let walk = walks.get(&date);
            CalendarDay {
                date,
                walked: walk.is_some_and(|walk| walk.walked),
                manual: walk.is_some_and(|walk| walk.manual),
            }
        })
        .collect())
}

/// Twelve months of `year` as seen on `today`.
pub async fn month_stats<S: WalkStorage>(
    repository: &mut WalkRepository<S>,
    year: i32,
    today: NaiveDate,
) -> Result<Vec<MonthStats>> {
    let mut months = Vec::with_capacity(12);
    for month in 1..=12 {
        let walks = repository.get_walks_for_month(year, month).await?;
        let enabled = if year == today.year() {
            month <= today.month()
        } else {
            year < today.year()
        };
        months.push(MonthStats {
            year,
            month,
            month_name: month_name(month)?.chars().take(3).collect(),
            walk_count: count_walked(&walks),
            enabled,
        });
    }
    Ok(months)
}

pub fn year_total(months: &[MonthStats]) -> usize {
    months.iter().map(|month| month.walk_count).sum()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    use crate::{
        cloud::{mirror::ManualWalkMirror, ConfiguredIdentity},
        repository::WalkRepository,
        storage::walk_storage::WalkStorageImpl,
        utils::clock::FixedClock,
    };

    use super::{
        calendar_days, month_stats, month_walks, weekly_days, year_total, yearly_walks,
        YEARLY_LABEL,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    async fn repository(dir: &TempDir) -> Result<WalkRepository<WalkStorageImpl>> {
        let storage = WalkStorageImpl::new(dir.path().to_path_buf())?;
        let mirror = Arc::new(ManualWalkMirror::disabled(Arc::new(
            ConfiguredIdentity::new(None),
        )));
        let mut repository =
            WalkRepository::open(storage, mirror, Arc::new(FixedClock(date(2025, 3, 5)))).await?;

        for (day, walked) in [
            (date(2024, 12, 31), true),
            (date(2025, 2, 27), true),
            (date(2025, 2, 28), false),
            (date(2025, 3, 1), true),
            (date(2025, 3, 4), true),
        ] {
            repository.update_walk_from_detector(day, walked).await?;
        }
        repository.update_manual_walk(date(2025, 3, 2), true).await?;
        Ok(repository)
    }

    #[tokio::test]
    async fn test_counts() -> Result<()> {
        let dir = tempdir()?;
        let mut repository = repository(&dir).await?;

        let yearly = yearly_walks(&repository, 2025).await?;
        assert_eq!(yearly.value, 4);
        assert_eq!(yearly.label, YEARLY_LABEL);

        let march = month_walks(&mut repository, 2025, 3).await?;
        assert_eq!(march.value, 3);
        assert_eq!(march.label, "March");

        assert!(month_walks(&mut repository, 2025, 13).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_weekly_days() -> Result<()> {
        let dir = tempdir()?;
        let repository = repository(&dir).await?;

        let week = weekly_days(&repository, date(2025, 3, 5)).await?;

        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, date(2025, 2, 27));
        assert_eq!(week[0].label, "Thu");
        assert_eq!(week[6].date, date(2025, 3, 5));
        assert_eq!(week[6].label, "Wed");
        let walked = week.iter().map(|day| day.walked).collect::<Vec<_>>();
        assert_eq!(walked, [true, false, true, true, false, true, false]);
        Ok(())
    }

    #[tokio::test]
    async fn test_calendar_days() -> Result<()> {
        let dir = tempdir()?;
        let mut repository = repository(&dir).await?;

        let february = calendar_days(&mut repository, 2025, 2).await?;
        assert_eq!(february.len(), 28);
        assert!(february[26].walked);
        assert!(!february[27].walked);
        assert!(!february[0].walked);

        let march = calendar_days(&mut repository, 2025, 3).await?;
        assert_eq!(march.len(), 31);
        assert!(march[1].walked && march[1].manual);
        assert!(march[0].walked && !march[0].manual);
        Ok(())
    }

    #[tokio::test]
    async fn test_month_stats() -> Result<()> {
        let dir = tempdir()?;
        let mut repository = repository(&dir).await?;
        let today = date(2025, 3, 5);

        let months = month_stats(&mut repository, 2025, today).await?;
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month_name, "Jan");
        assert_eq!(months[1].walk_count, 1);
        assert_eq!(months[2].walk_count, 3);
        assert!(months[2].enabled);
        assert!(!months[3].enabled);
        assert_eq!(year_total(&months), 4);

        let past = month_stats(&mut repository, 2024, today).await?;
        assert!(past.iter().all(|month| month.enabled));
        assert_eq!(year_total(&past), 1);

        let future = month_stats(&mut repository, 2026, today).await?;
        assert!(future.iter().all(|month| !month.enabled));
        Ok(())
    }
}
