//! Outbound notification bridge
//!
//! The recompute pass hands every newly created alert to an
//! [`AlertNotifier`]. Delivery is best-effort: a failing notifier is logged
//! by the caller and never fails the pass.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Alert;

/// Environment variable for the per-user hourly notification cap
pub const ALERT_EMAILS_PER_HOUR_ENV: &str = "VIGIL_ALERT_EMAILS_PER_HOUR";

/// Default per-user hourly notification cap
pub const DEFAULT_ALERTS_PER_HOUR: usize = 5;

/// Consumer of finished alerts (email, push, ...)
pub trait AlertNotifier: Send + Sync {
    fn maybe_send_alert(&self, alert: &Alert) -> Result<()>;
}

/// Drops every alert
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl AlertNotifier for NoopNotifier {
    fn maybe_send_alert(&self, _alert: &Alert) -> Result<()> {
        Ok(())
    }
}

/// Writes each alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl AlertNotifier for LogNotifier {
    fn maybe_send_alert(&self, alert: &Alert) -> Result<()> {
        info!(
            user_id = alert.user_id,
            alert_id = alert.id,
            alert_type = alert.alert_type.as_str(),
            severity = alert.severity.as_str(),
            amount = alert.amount,
            "{}",
            alert.title
        );
        Ok(())
    }
}

/// Caps deliveries per user over a rolling hour; excess alerts are skipped
pub struct RateLimitedNotifier<N> {
    inner: N,
    per_hour: usize,
    sent: Mutex<HashMap<i64, VecDeque<DateTime<Utc>>>>,
}

impl<N: AlertNotifier> RateLimitedNotifier<N> {
    pub fn new(inner: N, per_hour: usize) -> Self {
        Self {
            inner,
            per_hour,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Cap read from `VIGIL_ALERT_EMAILS_PER_HOUR`, default 5
    pub fn from_env(inner: N) -> Self {
        let per_hour = std::env::var(ALERT_EMAILS_PER_HOUR_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ALERTS_PER_HOUR);
        Self::new(inner, per_hour)
    }

    pub fn per_hour(&self) -> usize {
        self.per_hour
    }

    fn try_reserve(&self, user_id: i64, now: DateTime<Utc>) -> bool {
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        let window = sent.entry(user_id).or_default();
        let cutoff = now - Duration::hours(1);
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }
        if window.len() >= self.per_hour {
            return false;
        }
        window.push_back(now);
        true
    }
}

impl<N: AlertNotifier> AlertNotifier for RateLimitedNotifier<N> {
    fn maybe_send_alert(&self, alert: &Alert) -> Result<()> {
        if !self.try_reserve(alert.user_id, Utc::now()) {
            debug!(
                user_id = alert.user_id,
                alert_id = alert.id,
                per_hour = self.per_hour,
                "Notification rate limit reached, skipping"
            );
            return Ok(());
        }
        self.inner.maybe_send_alert(alert).map_err(|e| match e {
            Error::NotificationDelivery(_) => e,
            other => Error::NotificationDelivery(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Severity};
    use crate::test_utils::ymd;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Counting(Arc<AtomicUsize>);

    impl AlertNotifier for Counting {
        fn maybe_send_alert(&self, _alert: &Alert) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl AlertNotifier for Failing {
        fn maybe_send_alert(&self, _alert: &Alert) -> Result<()> {
            Err(Error::InvalidData("smtp down".to_string()))
        }
    }

    fn alert(user_id: i64) -> Alert {
        Alert {
            id: 1,
            user_id,
            alert_type: AlertType::LargeTransaction,
            severity: Severity::Critical,
            title: "Large Transaction Detected".to_string(),
            description: String::new(),
            amount: 900.0,
            merchant: None,
            category: None,
            txn_date: ymd(2024, 3, 1),
            reason: "Rule: large_transaction".to_string(),
            txn_id: None,
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
    fn test_rate_limit_is_per_user() {
        let counter = Counting::default();
        let notifier = RateLimitedNotifier::new(counter.clone(), 2);

        for _ in 0..4 {
            notifier.maybe_send_alert(&alert(1)).unwrap();
        }
        notifier.maybe_send_alert(&alert(2)).unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_window_rolls_over() {
        let notifier = RateLimitedNotifier::new(NoopNotifier, 1);
        let start = Utc::now();
        assert!(notifier.try_reserve(1, start));
        assert!(!notifier.try_reserve(1, start + Duration::minutes(30)));
        assert!(notifier.try_reserve(1, start + Duration::minutes(61)));
    }

    #[test]
    fn test_failures_become_delivery_errors() {
        let notifier = RateLimitedNotifier::new(Failing, 5);
        assert!(matches!(
            notifier.maybe_send_alert(&alert(1)),
            Err(Error::NotificationDelivery(_))
        ));
    }
}
