//! Access to the user's health data and the per-day goal check built on top of it.
//!
//! [HealthProvider] is the seam to whatever records steps and workouts. The only bundled
//! implementation is [export::ExportHealthProvider], which reads exported JSON files.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::detector::signals::{ExerciseSession, StepBucket};

pub mod export;
pub mod goal;

/// Read-only queries the goal check needs from a health data source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Whether reading steps and exercise sessions is allowed.
    async fn has_permissions(&self) -> Result<bool>;

    /// Sessions overlapping `[start, end)`.
    async fn read_exercise_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExerciseSession>>;

    /// Step counts aggregated into one minute buckets, sorted by time.
    async fn read_step_buckets(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StepBucket>>;
}
