//! Decides whether a day satisfies the walking goal.
//!
//! Two independent sources of evidence are used:
//!  - An exercise session that lasted long enough on its own.
//!  - A streak of minutes whose step cadence looks like walking. Short stops (traffic lights,
//!    waiting for a door) don't break the streak, and the stopped minutes are credited back once
//!    walking resumes.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod signals;

use signals::{ExerciseSession, MinuteSeries};

pub const DEFAULT_MIN_SESSION_MINUTES: u32 = 30;
pub const DEFAULT_GOAL_MINUTES: u32 = 30;
/// Steps per minute from which a minute counts as walking.
pub const DEFAULT_CADENCE_THRESHOLD: u32 = 40;
/// Longest tolerated stop. Meant to cover ~3 minute stops.
pub const DEFAULT_MAX_GAP_MINUTES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Exercise sessions at least this long satisfy the goal immediately.
    pub min_session_minutes: u32,
    /// Credited streak length required from step data.
    pub goal_minutes: u32,
    pub cadence_threshold: u32,
    pub max_gap_minutes: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_session_minutes: DEFAULT_MIN_SESSION_MINUTES,
            goal_minutes: DEFAULT_GOAL_MINUTES,
            cadence_threshold: DEFAULT_CADENCE_THRESHOLD,
            max_gap_minutes: DEFAULT_MAX_GAP_MINUTES,
        }
    }
}

/// Incremental streak state. Feed it minutes in chronological order.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    config: DetectorConfig,
    continuous_minutes: u32,
    gap_minutes: u32,
}

impl StreakTracker {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            continuous_minutes: 0,
            gap_minutes: 0,
        }
    }

    /// Consumes the next minute and returns the credited streak length after it.
    pub fn push(&mut self, steps: u32) -> u32 {
        if steps >= self.config.cadence_threshold {
            self.continuous_minutes += 1 + self.gap_minutes;
            self.gap_minutes = 0;
        } else {
            self.gap_minutes += 1;
            if self.gap_minutes > self.config.max_gap_minutes {
                self.continuous_minutes = 0;
                self.gap_minutes = 0;
            }
        }
        self.continuous_minutes
    }

    pub fn continuous_minutes(&self) -> u32 {
        self.continuous_minutes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkingGoalDetector {
    config: DetectorConfig,
}

impl WalkingGoalDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect_goal(&self, sessions: &[ExerciseSession], minutes: &MinuteSeries) -> bool {
        if let Some(session) = sessions.iter().find(|s| self.is_qualifying_session(s)) {
            debug!(
                "Session from {} lasting {} minutes meets the goal",
                session.start,
                session.duration().num_minutes()
            );
            return true;
        }
        self.detect_from_steps(minutes.counts())
    }

    pub fn is_qualifying_session(&self, session: &ExerciseSession) -> bool {
        session.duration().num_minutes() >= self.config.min_session_minutes as i64
    }

    /// Stops scanning as soon as the goal is reached.
    pub fn detect_from_steps(&self, counts: &[u32]) -> bool {
        let mut tracker = StreakTracker::new(self.config);
        counts
            .iter()
            .any(|steps| tracker.push(*steps) >= self.config.goal_minutes)
    }

    /// Best credited streak over the whole series.
    pub fn longest_streak(&self, counts: &[u32]) -> u32 {
        let mut tracker = StreakTracker::new(self.config);
        counts
            .iter()
            .map(|steps| tracker.push(*steps))
            .max()
            .unwrap_or(0)
    }
}
