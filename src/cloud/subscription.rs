use std::{
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Something changed remotely. Carries no data on purpose, the consumer refetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalksChanged {
    pub observed_at: DateTime<Utc>,
}

/// Producer half handed to whatever watches the remote side.
pub struct ChangeSender {
    sender: mpsc::Sender<WalksChanged>,
    cancellation: CancellationToken,
}

impl ChangeSender {
    /// Returns false once the subscription is gone.
    pub async fn send(&self, event: WalksChanged) -> bool {
        tokio::select! {
            _ = self.cancellation.cancelled() => false,
            result = self.sender.send(event) => result.is_ok(),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Lazy stream of change events. Dropping or cancelling the handle stops the producer.
pub struct ChangeSubscription {
    events: ReceiverStream<WalksChanged>,
    cancellation: CancellationToken,
}

impl ChangeSubscription {
    pub fn channel() -> (ChangeSender, ChangeSubscription) {
        let (sender, receiver) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let cancellation = CancellationToken::new();
        (
            ChangeSender {
                sender,
                cancellation: cancellation.clone(),
            },
            ChangeSubscription {
                events: ReceiverStream::new(receiver),
                cancellation,
            },
        )
    }

    /// A subscription that ends immediately.
    pub fn closed() -> Self {
        let (_, subscription) = Self::channel();
        subscription.cancel();
        subscription
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Stream for ChangeSubscription {
    type Item = WalksChanged;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancellation.is_cancelled() {
            return Poll::Ready(None);
        }
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use futures::StreamExt;

    use super::{ChangeSubscription, WalksChanged};

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (sender, mut subscription) = ChangeSubscription::channel();
        let first = WalksChanged {
            observed_at: Utc::now(),
        };
        assert!(sender.send(first).await);
        assert!(sender.send(first).await);
        drop(sender);

        assert_eq!(subscription.next().await, Some(first));
        assert_eq!(subscription.next().await, Some(first));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_stops_producer() {
        let (sender, subscription) = ChangeSubscription::channel();
        drop(subscription);

        assert!(sender.cancellation().is_cancelled());
        assert!(
            !sender
                .send(WalksChanged {
                    observed_at: Utc::now()
                })
                .await
        );
    }

    #[tokio::test]
    async fn test_closed_subscription_ends() {
        let mut subscription = ChangeSubscription::closed();
        assert!(subscription.is_cancelled());
        assert_eq!(subscription.next().await, None);
    }
}
