use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An exercise session reported by the health provider.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct ExerciseSession {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Free form activity name as reported by the provider, e.g. "walking".
    #[serde(default)]
    pub kind: Option<String>,
}

impl ExerciseSession {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Steps counted during the minute starting at `start`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct StepBucket {
    pub start: DateTime<Utc>,
    pub count: u32,
}

/// Dense per-minute step counts for a time window. Minutes without a bucket hold zero.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MinuteSeries {
    counts: Vec<u32>,
}

impl MinuteSeries {
    pub fn from_counts(counts: Vec<u32>) -> Self {
        Self { counts }
    }

    /// Places every bucket into the minute slot it starts in. Buckets outside of
    /// `[start, end)` are dropped and buckets sharing a slot are summed.
    pub fn from_buckets<'a>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        buckets: impl IntoIterator<Item = &'a StepBucket>,
    ) -> Self {
        let len = (end - start).num_minutes().max(0) as usize;
        let mut counts = vec![0u32; len];
        for bucket in buckets {
            if bucket.start < start || bucket.start >= end {
                continue;
            }
            let slot = (bucket.start - start).num_minutes() as usize;
            if let Some(value) = counts.get_mut(slot) {
                *value = value.saturating_add(bucket.count);
            }
        }
        Self { counts }
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn total_steps(&self) -> u64 {
        self.counts.iter().map(|v| *v as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{MinuteSeries, StepBucket};

    #[test]
    fn test_from_buckets_fills_gaps_with_zero() {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let end = start + Duration::minutes(5);
        let buckets = [
            StepBucket {
                start: start + Duration::minutes(1),
                count: 50,
            },
            StepBucket {
                start: start + Duration::minutes(3),
                count: 70,
            },
        ];

        let series = MinuteSeries::from_buckets(start, end, &buckets);

        assert_eq!(series.counts(), &[0, 50, 0, 70, 0]);
        assert_eq!(series.total_steps(), 120);
    }

    #[test]
    fn test_from_buckets_ignores_outside_and_sums_same_minute() {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let end = start + Duration::minutes(3);
        let buckets = [
            StepBucket {
                start: start - Duration::seconds(30),
                count: 500,
            },
            StepBucket {
                start,
                count: 20,
            },
            StepBucket {
                start: start + Duration::seconds(40),
                count: 25,
            },
            StepBucket {
                start: end,
                count: 500,
            },
        ];

        let series = MinuteSeries::from_buckets(start, end, &buckets);

        assert_eq!(series.counts(), &[45, 0, 0]);
    }
}
