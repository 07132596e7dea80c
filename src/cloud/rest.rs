use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder};
use tracing::{debug, info, warn};

use crate::config::CloudConfig;

use super::{
    subscription::{ChangeSender, ChangeSubscription, WalksChanged},
    CloudBackend, ManualWalkRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [CloudBackend] over a PostgREST style HTTP API (`/rest/v1/<table>`).
///
/// The API has no push channel of its own here, so changes are detected by polling the user's
/// rows and comparing them with the previous snapshot.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    poll_interval: Duration,
}

impl RestBackend {
    pub fn new(config: &CloudConfig, poll_interval: Duration) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            poll_interval,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn upsert_request(&self, record: &ManualWalkRecord) -> RequestBuilder {
        self.request(Method::POST)
            .query(&[("on_conflict", "user_id,walk_date")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
    }

    fn delete_request(&self, user_id: &str, date: NaiveDate) -> RequestBuilder {
        self.request(Method::DELETE).query(&[
            ("user_id", format!("eq.{user_id}")),
            ("walk_date", format!("eq.{date}")),
        ])
    }

    fn fetch_request(&self, user_id: &str) -> RequestBuilder {
        self.request(Method::GET)
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))])
    }
}

/// Emits an event whenever the user's walks differ from the previous fetch. The first fetch
/// only sets the baseline. Stops once the subscription is cancelled or dropped.
async fn poll_changes<B: CloudBackend>(
    backend: B,
    user_id: String,
    poll_interval: Duration,
    sender: ChangeSender,
) {
    let mut previous: Option<Vec<ManualWalkRecord>> = None;
    loop {
        match backend.fetch_manual_walks(&user_id).await {
            Ok(mut walks) => {
                walks.sort_by(|a, b| a.walk_date.cmp(&b.walk_date));
                if previous.as_ref().is_some_and(|previous| *previous != walks) {
                    debug!("Remote walks changed");
                    let event = WalksChanged {
                        observed_at: Utc::now(),
                    };
                    if !sender.send(event).await {
                        break;
                    }
                }
                previous = Some(walks);
            }
            Err(e) => warn!("Polling remote walks failed {e:?}"),
        }

        tokio::select! {
            _ = sender.cancellation().cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => (),
        }
    }
    info!("Stopped polling remote walks");
}

#[async_trait]
impl CloudBackend for RestBackend {
    async fn upsert_manual_walk(&self, record: ManualWalkRecord) -> Result<()> {
        self.upsert_request(&record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_manual_walk(&self, user_id: &str, date: NaiveDate) -> Result<()> {
        self.delete_request(user_id, date)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_manual_walks(&self, user_id: &str) -> Result<Vec<ManualWalkRecord>> {
        let walks = self
            .fetch_request(user_id)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ManualWalkRecord>>()
            .await?;
        Ok(walks)
    }

    async fn subscribe(&self, user_id: &str) -> Result<ChangeSubscription> {
        let (sender, subscription) = ChangeSubscription::channel();
        tokio::spawn(poll_changes(
            self.clone(),
            user_id.to_string(),
            self.poll_interval,
            sender,
        ));
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use chrono::NaiveDate;
    use futures::StreamExt;
    use reqwest::Method;

    use crate::{
        cloud::{subscription::ChangeSubscription, ManualWalkRecord, MockCloudBackend},
        config::CloudConfig,
    };

    use super::{poll_changes, RestBackend};

    const POLL: Duration = Duration::from_secs(5);

    fn backend() -> RestBackend {
        RestBackend::new(
            &CloudConfig {
                url: "https://example.supabase.co/".into(),
                api_key: "key".into(),
                table: "manual_walks".into(),
            },
            POLL,
        )
        .unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    fn query(request: &reqwest::Request) -> HashMap<String, String> {
        request.url().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_table_url() {
        assert_eq!(
            backend().table_url(),
            "https://example.supabase.co/rest/v1/manual_walks"
        );
    }

    #[test]
    fn test_upsert_request() -> Result<()> {
        let record = ManualWalkRecord::new("user-1", date(3), true);
        let request = backend().upsert_request(&record).build()?;

        assert_eq!(*request.method(), Method::POST);
        assert_eq!(request.url().path(), "/rest/v1/manual_walks");
        assert_eq!(query(&request)["on_conflict"], "user_id,walk_date");
        assert_eq!(
            request.headers()["prefer"],
            "resolution=merge-duplicates,return=minimal"
        );
        assert_eq!(request.headers()["apikey"], "key");
        assert_eq!(request.headers()["authorization"], "Bearer key");

        let body = request.body().and_then(|body| body.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<ManualWalkRecord>(body)?, record);
        Ok(())
    }

    #[test]
    fn test_delete_and_fetch_filter_by_user() -> Result<()> {
        let delete = backend().delete_request("user-1", date(4)).build()?;
        assert_eq!(*delete.method(), Method::DELETE);
        let pairs = query(&delete);
        assert_eq!(pairs["user_id"], "eq.user-1");
        assert_eq!(pairs["walk_date"], "eq.2025-09-04");

        let fetch = backend().fetch_request("user-1").build()?;
        assert_eq!(*fetch.method(), Method::GET);
        let pairs = query(&fetch);
        assert_eq!(pairs["select"], "*");
        assert_eq!(pairs["user_id"], "eq.user-1");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_emits_only_on_change() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cloud = MockCloudBackend::new();
        {
            let calls = calls.clone();
            cloud.expect_fetch_manual_walks().returning(move |user| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let first = ManualWalkRecord::new(user.to_string(), date(1), true);
                let second = ManualWalkRecord::new(user.to_string(), date(2), call >= 4);
                match call {
                    1 => Ok(vec![first, second]),
                    2 => Ok(vec![second, first]),
                    3 => Err(anyhow!("connection reset")),
                    _ => Ok(vec![first, second]),
                }
            });
        }

        let (sender, mut subscription) = ChangeSubscription::channel();
        let poller = tokio::spawn(poll_changes(cloud, "user-1".to_string(), POLL, sender));

        // Baseline, reordered rows and the failed fetch stay silent.
        let event = tokio::time::timeout(POLL * 10, subscription.next()).await?;
        assert!(event.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        assert!(tokio::time::timeout(POLL * 3, subscription.next())
            .await
            .is_err());
        assert!(calls.load(Ordering::SeqCst) >= 6);

        subscription.cancel();
        tokio::time::timeout(POLL * 2, poller).await??;
        Ok(())
    }
}
