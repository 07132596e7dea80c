use std::future;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::{stream, Stream};
use now::DateTimeNow;

const NOON: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(v) => v,
    None => NaiveTime::MIN,
};

/// This is the standard way of converting a month to a file name in layzbug.
pub fn month_to_record_name(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Parses a name produced by [month_to_record_name].
pub fn record_name_to_month(name: &str) -> Option<(i32, u32)> {
    let (year, month) = name.split_once('-')?;
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// First and last day of a month. `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Local midnight of the given day expressed in UTC. Falls back to UTC midnight when the local
/// time zone can't represent the day.
pub fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    match Local.from_local_datetime(&date.and_time(NOON)).earliest() {
        Some(noon) => noon.beginning_of_day().with_timezone(&Utc),
        None => Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
    }
}

/// Half open `[start, end)` window covering a local calendar day.
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_day_start(date);
    let end = date
        .succ_opt()
        .map(local_day_start)
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold(Some(start), move |current| {
        future::ready(match current {
            Some(current) if current <= end => Some((current, current.succ_opt())),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use futures::StreamExt;

    use super::*;

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        assert!(month_bounds(2025, 13).is_none());
    }

    #[test]
    fn test_record_name() {
        assert_eq!(month_to_record_name(2026, 3), "2026-03");
        assert_eq!(record_name_to_month("2026-03"), Some((2026, 3)));
        assert_eq!(record_name_to_month("2026-13"), None);
        assert_eq!(record_name_to_month("notes.txt"), None);
    }

    #[test]
    fn test_local_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let (start, end) = local_day_bounds(date);
        assert!(start < end);
        assert!(end - start >= Duration::hours(23));
        assert!(end - start <= Duration::hours(25));
    }

    #[tokio::test]
    async fn test_date_range_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 12, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let dates = date_range(start, end).collect::<Vec<_>>().await;
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[0], start);
        assert_eq!(dates[3], end);

        let empty = date_range(end, start).collect::<Vec<_>>().await;
        assert!(empty.is_empty());
    }
}
