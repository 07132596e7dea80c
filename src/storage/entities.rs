use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Walk status of a single day, as stored on disk. There is at most one entity per date.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct WalkEntity {
    pub date: NaiveDate,
    pub walked: bool,
    /// Set when the user marked the day as walked themselves. Automatic detection never
    /// overwrites such days.
    #[serde(default)]
    pub manual: bool,
}

impl WalkEntity {
    pub fn detected(date: NaiveDate, walked: bool) -> Self {
        Self {
            date,
            walked,
            manual: false,
        }
    }

    /// Only walked days are remembered as manual. Unmarking makes the day eligible for
    /// detection again.
    pub fn manual(date: NaiveDate, walked: bool) -> Self {
        Self {
            date,
            walked,
            manual: walked,
        }
    }
}
