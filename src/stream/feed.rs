//! The one-per-second telemetry feed.
//!
//! A single task owns the sampling cadence so the event-loop histogram has
//! exactly one reader. Subscribers observe the feed through a watch channel:
//! they get the latest snapshot as soon as they attach, then every new one.

use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;

use crate::observability::metrics;
use crate::telemetry::{TelemetrySampler, TelemetrySnapshot};

type Latest = Option<Arc<TelemetrySnapshot>>;

#[derive(Clone)]
pub struct TelemetryFeed {
    rx: watch::Receiver<Latest>,
    subscribers: Arc<AtomicUsize>,
}

impl TelemetryFeed {
    /// Spawn the sampling task. It enables the event-loop monitor, samples
    /// immediately and then every `interval`, and disables the monitor when
    /// `shutdown` fires.
    pub fn start(
        sampler: Arc<TelemetrySampler>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = watch::channel::<Latest>(None);

        let handle = tokio::spawn(async move {
            sampler.monitor().enable();

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = sampler.collect_snapshot().await;
                        tx.send_replace(Some(Arc::new(snapshot)));
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Telemetry feed received shutdown signal, exiting loop");
                        break;
                    }
                }
            }

            sampler.monitor().disable();
        });

        let feed = Self {
            rx,
            subscribers: Arc::new(AtomicUsize::new(0)),
        };
        (feed, handle)
    }

    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> TelemetrySubscription {
        let count = self.subscribers.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_stream_subscribers("telemetry", count);

        TelemetrySubscription {
            inner: WatchStream::new(self.rx.clone()),
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

/// Stream of snapshots for one connection, starting with the latest one.
pub struct TelemetrySubscription {
    inner: WatchStream<Latest>,
    subscribers: Arc<AtomicUsize>,
}

impl Stream for TelemetrySubscription {
    type Item = Arc<TelemetrySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Some(snapshot)) => return Poll::Ready(Some(snapshot)),
                // Feed has not produced its first sample yet.
                Some(None) => continue,
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for TelemetrySubscription {
    fn drop(&mut self) {
        let remaining = self.subscribers.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        metrics::record_stream_subscribers("telemetry", remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::probe::{ProbeError, StoreProbe};
    use crate::telemetry::EventLoopMonitor;
    use async_trait::async_trait;
    use futures_util::StreamExt;

    struct Healthy;

    #[async_trait]
    impl StoreProbe for Healthy {
        async fn ping(&self) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    fn sampler() -> Arc<TelemetrySampler> {
        let monitor = Arc::new(EventLoopMonitor::new(Duration::from_millis(20)));
        Arc::new(TelemetrySampler::new(monitor, Arc::new(Healthy), Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn subscriber_receives_first_snapshot_without_waiting_a_full_interval() {
        let (_tx, rx) = broadcast::channel(1);
        let (feed, _handle) = TelemetryFeed::start(sampler(), Duration::from_secs(60), rx);

        let mut sub = feed.subscribe();
        let first = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("first snapshot should arrive immediately");
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn subscriber_count_tracks_drops() {
        let (_tx, rx) = broadcast::channel(1);
        let (feed, _handle) = TelemetryFeed::start(sampler(), Duration::from_secs(60), rx);

        let a = feed.subscribe();
        let b = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);
        drop(a);
        drop(b);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_feed_and_disables_monitor() {
        let (tx, rx) = broadcast::channel(1);
        let sampler = sampler();
        let (_feed, handle) = TelemetryFeed::start(sampler.clone(), Duration::from_millis(50), rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!sampler.monitor().is_enabled());
    }
}
