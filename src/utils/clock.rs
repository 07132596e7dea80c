use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Represents an entity responsible for providing dates across application. Sync and backfill
/// code only asks the clock for "today", which lets tests pin the calendar.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Calendar day in the user's local time zone.
    fn today(&self) -> NaiveDate {
        self.time().with_timezone(&Local).date_naive()
    }

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock frozen on a single day. Sleeping still goes through tokio so paused-time tests advance.
#[cfg(test)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
#[async_trait]
impl Clock for FixedClock {
    fn time(&self) -> DateTime<Utc> {
        use chrono::{NaiveTime, TimeZone};
        Utc.from_utc_datetime(&self.0.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()))
    }

    fn today(&self) -> NaiveDate {
        self.0
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
