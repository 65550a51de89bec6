use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{BatchCallback, DealFeed, FeedSubscription};
use crate::models::Deal;
use crate::shutdown::ShutdownToken;

/// Adapts any `mpsc` push source into a feed. Single subscriber.
pub struct ChannelFeed {
    rx: Mutex<Option<mpsc::Receiver<Vec<Deal>>>>,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::Receiver<Vec<Deal>>) -> Self {
        Self {
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Feed plus the sender that drives it
    pub fn pair(capacity: usize) -> (mpsc::Sender<Vec<Deal>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

impl DealFeed for ChannelFeed {
    fn name(&self) -> &str {
        "channel"
    }

    fn subscribe(&self, on_batch: BatchCallback, shutdown: ShutdownToken) -> FeedSubscription {
        let Some(mut rx) = self.rx.lock().take() else {
            warn!("Channel feed already subscribed; ignoring second subscriber");
            return FeedSubscription::inert(self.name());
        };

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,

                    batch = rx.recv() => match batch {
                        Some(batch) if batch.is_empty() => continue,
                        Some(batch) => {
                            if shutdown.is_cancelled() {
                                break;
                            }
                            on_batch(batch);
                        }
                        None => {
                            info!("Channel feed source closed");
                            break;
                        }
                    },
                }
            }
        });

        FeedSubscription::new(self.name(), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn deal(id: i64) -> Deal {
        Deal::new(id, Utc::now(), "USD/RUB_TOM", 90.0, 10.0, Side::Sell)
    }

    #[tokio::test]
    async fn test_forwards_batches_until_source_closes() {
        let (tx, feed) = ChannelFeed::pair(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = feed.subscribe(
            Arc::new(move |batch: Vec<Deal>| sink.lock().extend(batch.into_iter().map(|d| d.id))),
            ShutdownToken::new(),
        );

        tx.send(vec![deal(1), deal(2)]).await.unwrap();
        tx.send(Vec::new()).await.unwrap();
        tx.send(vec![deal(3)]).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), sub.join())
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (tx, feed) = ChannelFeed::pair(8);
        let shutdown = ShutdownToken::new();
        let sub = feed.subscribe(Arc::new(|_batch: Vec<Deal>| {}), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), sub.join())
            .await
            .unwrap();
        assert!(tx.send(vec![deal(1)]).await.is_err());
    }

    #[tokio::test]
    async fn test_second_subscriber_is_inert() {
        let (_tx, feed) = ChannelFeed::pair(1);
        let _first = feed.subscribe(Arc::new(|_batch: Vec<Deal>| {}), ShutdownToken::new());
        let second = feed.subscribe(Arc::new(|_batch: Vec<Deal>| {}), ShutdownToken::new());
        assert!(second.is_finished());
    }
}
