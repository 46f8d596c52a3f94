//! Subscriber registry for the live trace stream.

use dashmap::DashMap;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::trace::RequestTrace;

/// Fan-out of finished traces to every connected trace-stream subscriber.
///
/// Each subscriber owns a bounded queue. A full queue drops the event for that
/// subscriber only; there is no buffering beyond the queue and no replay.
#[derive(Clone)]
pub struct TraceHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    subscribers: DashMap<u64, mpsc::Sender<Arc<RequestTrace>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl TraceHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    pub fn subscribe(&self) -> TraceSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        self.inner.subscribers.insert(id, tx);

        let count = self.inner.subscribers.len();
        metrics::record_stream_subscribers("traces", count);
        tracing::debug!(subscriber = id, subscribers = count, "Trace stream subscribed");

        TraceSubscription {
            id,
            rx,
            hub: self.inner.clone(),
        }
    }

    pub fn publish(&self, trace: Arc<RequestTrace>) {
        let mut closed = Vec::new();

        for entry in self.inner.subscribers.iter() {
            match entry.value().try_send(trace.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    metrics::record_trace_event_dropped();
                    tracing::debug!(subscriber = *entry.key(), "Trace subscriber lagging, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards stay locked while iterating.
        for id in closed {
            self.inner.remove(id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Drop every subscriber queue so open streams end. Used at shutdown.
    pub fn close(&self) {
        self.inner.subscribers.clear();
        metrics::record_stream_subscribers("traces", 0);
    }
}

impl HubInner {
    fn remove(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            metrics::record_stream_subscribers("traces", self.subscribers.len());
            tracing::debug!(subscriber = id, "Trace stream unsubscribed");
        }
    }
}

/// A live view of the trace stream. Dropping it unregisters the subscriber.
pub struct TraceSubscription {
    id: u64,
    rx: mpsc::Receiver<Arc<RequestTrace>>,
    hub: Arc<HubInner>,
}

impl TraceSubscription {
    pub async fn recv(&mut self) -> Option<Arc<RequestTrace>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<RequestTrace>> {
        self.rx.try_recv().ok()
    }
}

impl Stream for TraceSubscription {
    type Item = Arc<RequestTrace>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TraceSubscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::PhaseTiming;
    use chrono::Utc;

    fn trace(id: &str) -> Arc<RequestTrace> {
        Arc::new(RequestTrace {
            trace_id: id.into(),
            method: "GET".into(),
            path: "/api/about".into(),
            status_code: 200,
            duration_ms: 1.0,
            timing: PhaseTiming::default(),
            user_id: None,
            user_agent: "test".into(),
            ip: "127.0.0.1".into(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn broadcasts_to_all_subscribers() {
        let hub = TraceHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(trace("t1"));

        assert_eq!(a.try_recv().unwrap().trace_id, "t1");
        assert_eq!(b.try_recv().unwrap().trace_id, "t1");
    }

    #[test]
    fn late_subscribers_see_no_replay() {
        let hub = TraceHub::new(8);
        hub.publish(trace("before"));
        let mut sub = hub.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = TraceHub::new(8);
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn lagging_subscriber_drops_newest_without_blocking_others() {
        let hub = TraceHub::new(1);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        hub.publish(trace("t1"));
        assert_eq!(fast.try_recv().unwrap().trace_id, "t1");
        hub.publish(trace("t2"));

        assert_eq!(slow.try_recv().unwrap().trace_id, "t1");
        assert!(slow.try_recv().is_none());
        assert_eq!(fast.try_recv().unwrap().trace_id, "t2");
    }

    #[tokio::test]
    async fn close_ends_open_subscriptions() {
        let hub = TraceHub::new(8);
        let mut sub = hub.subscribe();
        hub.close();
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
