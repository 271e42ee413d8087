//! Live alert lifecycle events
//!
//! [`StreamPublisher`] fans each event out to every subscriber. Each
//! subscriber owns a bounded channel; delivery uses `try_send` only, so a
//! slow or gone subscriber is dropped instead of stalling the publisher or
//! its peers. Delivery is at-most-once and there is no replay.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::models::Alert;

/// Default per-subscriber buffer
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Event vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamEventKind {
    #[serde(rename = "alert.new")]
    New,
    #[serde(rename = "alert.updated")]
    Updated,
    #[serde(rename = "alert.acknowledged")]
    Acknowledged,
    #[serde(rename = "alert.dismissed")]
    Dismissed,
}

impl StreamEventKind {
    pub const ALL: [StreamEventKind; 4] = [
        StreamEventKind::New,
        StreamEventKind::Updated,
        StreamEventKind::Acknowledged,
        StreamEventKind::Dismissed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventKind::New => "alert.new",
            StreamEventKind::Updated => "alert.updated",
            StreamEventKind::Acknowledged => "alert.acknowledged",
            StreamEventKind::Dismissed => "alert.dismissed",
        }
    }
}

impl fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One published event; `user_id` lets transports filter per subscriber
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    pub user_id: i64,
    pub alert: Alert,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<StreamEvent>,
}

struct Inner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Fan-out broadcaster of alert events
#[derive(Clone)]
pub struct StreamPublisher {
    inner: Arc<Inner>,
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamPublisher {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Publisher whose subscribers each buffer up to `buffer` events
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    // A panic while holding the lock leaves the list itself intact
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.inner.buffer);
        self.subscribers().push(Subscriber { id, sender });
        debug!(subscriber = id, "Stream subscriber registered");
        Subscription { id, receiver }
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subs = self.subscribers();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Deliver an event to every subscriber; returns how many received it
    ///
    /// Subscribers whose channel is full or closed are removed.
    pub fn publish(&self, kind: StreamEventKind, alert: &Alert) -> usize {
        let event = StreamEvent {
            kind,
            user_id: alert.user_id,
            alert: alert.clone(),
        };

        let mut delivered = 0;
        self.subscribers()
            .retain(|sub| match sub.sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = sub.id, event = kind.as_str(), "Subscriber full, dropping");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = sub.id, "Subscriber closed, dropping");
                    false
                }
            });
        delivered
    }
}

/// Receiving end of one subscription
pub struct Subscription {
    pub id: u64,
    receiver: mpsc::Receiver<StreamEvent>,
}

impl Subscription {
    /// Wait for the next event; None once the subscriber has been dropped
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event, if any
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Severity};
    use crate::test_utils::ymd;
    use chrono::Utc;

    fn alert(id: i64, user_id: i64) -> Alert {
        Alert {
            id,
            user_id,
            alert_type: AlertType::NewMerchant,
            severity: Severity::Moderate,
            title: "New Merchant".to_string(),
            description: "First high-value spend at Cafe".to_string(),
            amount: 12.0,
            merchant: Some("Cafe".to_string()),
            category: None,
            txn_date: ymd(2024, 3, 1),
            reason: "Rule: new_merchant".to_string(),
            txn_id: Some(1),
            metadata: None,
            acknowledged: false,
            acknowledged_at: None,
            dismissed: false,
            dismissed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fan_out_in_publish_order() {
        let publisher = StreamPublisher::new();
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();

        assert_eq!(publisher.publish(StreamEventKind::New, &alert(1, 7)), 2);
        assert_eq!(publisher.publish(StreamEventKind::Updated, &alert(1, 7)), 2);

        for sub in [&mut a, &mut b] {
            let first = sub.try_recv().unwrap();
            assert_eq!(first.name(), "alert.new");
            assert_eq!(first.user_id, 7);
            assert_eq!(sub.try_recv().unwrap().kind, StreamEventKind::Updated);
            assert!(sub.try_recv().is_none());
        }
    }

    #[test]
    fn test_closed_subscriber_removed() {
        let publisher = StreamPublisher::new();
        let closed = publisher.subscribe();
        let mut open = publisher.subscribe();
        drop(closed);

        assert_eq!(publisher.publish(StreamEventKind::New, &alert(1, 1)), 1);
        assert_eq!(publisher.subscriber_count(), 1);
        assert!(open.try_recv().is_some());
    }

    #[test]
    fn test_full_subscriber_removed_others_served() {
        let publisher = StreamPublisher::with_buffer(1);
        let _slow = publisher.subscribe();
        let mut fast = publisher.subscribe();

        assert_eq!(publisher.publish(StreamEventKind::New, &alert(1, 1)), 2);
        assert!(fast.try_recv().is_some());

        // `_slow` never drains its single slot
        assert_eq!(publisher.publish(StreamEventKind::New, &alert(2, 1)), 1);
        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(fast.try_recv().unwrap().alert.id, 2);
    }

    #[test]
    fn test_unsubscribe() {
        let publisher = StreamPublisher::new();
        let sub = publisher.subscribe();
        assert!(publisher.unsubscribe(sub.id));
        assert!(!publisher.unsubscribe(sub.id));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_async() {
        let publisher = StreamPublisher::new();
        let mut sub = publisher.subscribe();
        publisher.publish(StreamEventKind::Dismissed, &alert(3, 2));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, StreamEventKind::Dismissed);
        assert_eq!(event.alert.id, 3);
    }
}
