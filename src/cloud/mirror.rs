use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use super::{subscription::ChangeSubscription, CloudBackend, IdentityProvider, ManualWalkRecord};

/// Best-effort access to the remote copy of manual walks. Every failure is logged and swallowed:
/// local storage stays the source of truth, and the next natural sync trigger retries.
pub struct ManualWalkMirror {
    backend: Option<Arc<dyn CloudBackend>>,
    identity: Arc<dyn IdentityProvider>,
}

impl ManualWalkMirror {
    pub fn new(backend: Arc<dyn CloudBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend: Some(backend),
            identity,
        }
    }

    /// Mirror used when no cloud backend is configured.
    pub fn disabled(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend: None,
            identity,
        }
    }

    fn session(&self) -> Option<(&dyn CloudBackend, String)> {
        let backend = self.backend.as_deref()?;
        let user_id = self.identity.user_id()?;
        Some((backend, user_id))
    }

    pub fn is_logged_in(&self) -> bool {
        let logged_in = self.session().is_some();
        debug!("Cloud logged in: {logged_in}");
        logged_in
    }

    pub async fn sync_manual_walk(&self, date: NaiveDate, is_walked: bool) {
        let Some((backend, user_id)) = self.session() else {
            warn!("Not logged in, cannot sync {date}");
            return;
        };

        debug!("Syncing manual walk: {date} = {is_walked}");
        match backend
            .upsert_manual_walk(ManualWalkRecord::new(user_id, date, is_walked))
            .await
        {
            Ok(_) => info!("Synced manual walk: {date} = {is_walked}"),
            Err(e) => error!("Failed to sync {date}: {e:?}"),
        }
    }

    pub async fn delete_manual_walk(&self, date: NaiveDate) {
        let Some((backend, user_id)) = self.session() else {
            warn!("Not logged in, cannot delete {date}");
            return;
        };

        match backend.delete_manual_walk(&user_id, date).await {
            Ok(_) => info!("Deleted manual walk: {date}"),
            Err(e) => error!("Failed to delete {date}: {e:?}"),
        }
    }

    pub async fn fetch_all_manual_walks(&self) -> Vec<ManualWalkRecord> {
        let Some((backend, user_id)) = self.session() else {
            warn!("Not logged in, cannot fetch walks");
            return vec![];
        };

        match backend.fetch_manual_walks(&user_id).await {
            Ok(walks) => {
                info!("Fetched {} manual walks", walks.len());
                walks
            }
            Err(e) => {
                error!("Failed to fetch walks: {e:?}");
                vec![]
            }
        }
    }

    /// Subscription to remote changes. Ends immediately when not logged in or when the backend
    /// refuses to subscribe.
    pub async fn observe_manual_walks(&self) -> ChangeSubscription {
        let Some((backend, user_id)) = self.session() else {
            warn!("Not logged in, cannot observe walks");
            return ChangeSubscription::closed();
        };

        info!("Starting change listener");
        match backend.subscribe(&user_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Failed to start change listener: {e:?}");
                ChangeSubscription::closed()
            }
        }
    }
}
