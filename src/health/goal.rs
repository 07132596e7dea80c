use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::{
    detector::{signals::MinuteSeries, WalkingGoalDetector},
    utils::time::local_day_bounds,
};

use super::HealthProvider;

/// Everything the detector saw for a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEvaluation {
    pub date: NaiveDate,
    pub goal_met: bool,
    pub sessions: usize,
    pub longest_session_minutes: i64,
    pub longest_streak_minutes: u32,
    pub total_steps: u64,
}

/// Bridges [HealthProvider] and [WalkingGoalDetector]. Provider failures never leave this type:
/// a day that can't be read is a day where the goal wasn't met.
pub struct GoalChecker {
    provider: Box<dyn HealthProvider>,
    detector: WalkingGoalDetector,
}

impl GoalChecker {
    pub fn new(provider: Box<dyn HealthProvider>, detector: WalkingGoalDetector) -> Self {
        Self { provider, detector }
    }

    pub async fn has_permissions(&self) -> bool {
        match self.provider.has_permissions().await {
            Ok(granted) => {
                debug!("Permissions granted: {granted}");
                granted
            }
            Err(e) => {
                warn!("Permission check failed {e:?}");
                false
            }
        }
    }

    pub async fn check_walking_goal(&self, date: NaiveDate) -> bool {
        match self.evaluate(date).await {
            Ok(evaluation) => evaluation.goal_met,
            Err(e) => {
                warn!("Failed to read health data for {date}, treating as not walked {e:?}");
                false
            }
        }
    }

    /// Reads the local calendar day and runs the detector on it.
    pub async fn evaluate(&self, date: NaiveDate) -> Result<DayEvaluation> {
        let (start, end) = local_day_bounds(date);

        let sessions = self.provider.read_exercise_sessions(start, end).await?;
        let buckets = self.provider.read_step_buckets(start, end).await?;
        let minutes = MinuteSeries::from_buckets(start, end, &buckets);

        let goal_met = self.detector.detect_goal(&sessions, &minutes);
        debug!(
            "{date}: {} sessions, {} steps, goal met {goal_met}",
            sessions.len(),
            minutes.total_steps()
        );

        Ok(DayEvaluation {
            date,
            goal_met,
            sessions: sessions.len(),
            longest_session_minutes: sessions
                .iter()
                .map(|s| s.duration().num_minutes())
                .max()
                .unwrap_or(0),
            longest_streak_minutes: self.detector.longest_streak(minutes.counts()),
            total_steps: minutes.total_steps(),
        })
    }
}
