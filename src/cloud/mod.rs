//! Remote mirror of manually set walks.
//!
//! Only manual walks leave the device. Detected walks are recomputed on every device from its own
//! health data. [mirror::ManualWalkMirror] is what the rest of the application talks to; it never
//! fails and quietly does nothing when the user isn't logged in.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod mirror;
pub mod rest;
pub mod subscription;

use subscription::ChangeSubscription;

/// A manual walk as stored remotely, keyed by (user, date).
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ManualWalkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub walk_date: NaiveDate,
    pub is_walked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManualWalkRecord {
    pub fn new(user_id: impl Into<String>, walk_date: NaiveDate, is_walked: bool) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            walk_date,
            is_walked,
            updated_at: None,
        }
    }
}

/// Remote table of manual walks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudBackend: Send + Sync {
    async fn upsert_manual_walk(&self, record: ManualWalkRecord) -> Result<()>;

    async fn delete_manual_walk(&self, user_id: &str, date: NaiveDate) -> Result<()>;

    async fn fetch_manual_walks(&self, user_id: &str) -> Result<Vec<ManualWalkRecord>>;

    /// Notifies about changes to the user's walks. Events carry no data, consumers are expected
    /// to refetch.
    async fn subscribe(&self, user_id: &str) -> Result<ChangeSubscription>;
}

/// Supplies who is using the application.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> Option<String>;

    fn is_logged_in(&self) -> bool {
        self.user_id().is_some()
    }
}

/// Identity taken from the configuration file.
pub struct ConfiguredIdentity {
    user_id: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|v| !v.trim().is_empty()),
        }
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ConfiguredIdentity, IdentityProvider, ManualWalkRecord};

    #[test]
    fn test_record_wire_names() {
        let record: ManualWalkRecord = serde_json::from_str(
            r#"{"id":"7","user_id":"u1","walk_date":"2025-04-02","is_walked":true,"updated_at":"2025-04-02T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.walk_date, NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        assert!(record.is_walked);

        let value = serde_json::to_value(ManualWalkRecord::new("u1", record.walk_date, false))
            .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"user_id": "u1", "walk_date": "2025-04-02", "is_walked": false})
        );
    }

    #[test]
    fn test_blank_identity_is_logged_out() {
        assert!(!ConfiguredIdentity::new(None).is_logged_in());
        assert!(!ConfiguredIdentity::new(Some("  ".into())).is_logged_in());
        assert_eq!(
            ConfiguredIdentity::new(Some("u1".into())).user_id(),
            Some("u1".to_string())
        );
    }
}
