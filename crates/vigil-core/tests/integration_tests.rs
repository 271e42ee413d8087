//! Integration tests for vigil-core
//!
//! These tests exercise the full import → recompute → acknowledge workflow
//! against a real (temp file) database.

use chrono::{Duration, Local};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vigil_core::{
    db::Database,
    import::{import_csv, import_csv_file},
    models::{Alert, AlertThresholds, AlertType, AuditAction, Severity, YearMonth},
    AlertNotifier, AlertService, Error, StreamEventKind, StreamPublisher,
};

/// Three months of Electronics history at 100/month before March 2024
const ELECTRONICS_HISTORY: &str = "\
2023-12-05,BEST BUY,-100.00,Electronics
2024-01-05,BEST BUY,-100.00,Electronics
2024-02-05,BEST BUY,-100.00,Electronics
";

fn march() -> YearMonth {
    "2024-03".parse().unwrap()
}

fn setup(email: &str, rows: &str) -> (AlertService, i64) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user = import_user(&db, email, rows);
    (AlertService::new(db), user)
}

fn import_user(db: &Database, email: &str, rows: &str) -> i64 {
    let user = db.get_or_create_user(email).unwrap().id;
    let csv = format!("date,description,amount,category\n{}", rows);
    import_csv(db, user, csv.as_bytes()).expect("Failed to import CSV");
    user
}

fn alerts_of(service: &AlertService, user: i64, alert_type: AlertType) -> Vec<Alert> {
    service
        .db()
        .list_user_alerts(user)
        .unwrap()
        .into_iter()
        .filter(|a| a.alert_type == alert_type)
        .collect()
}

fn signatures(alerts: &[Alert]) -> Vec<(String, Severity)> {
    let mut sigs: Vec<_> = alerts.iter().map(|a| (a.signature(), a.severity)).collect();
    sigs.sort_by(|a, b| a.0.cmp(&b.0));
    sigs
}

// =============================================================================
// Import
// =============================================================================

#[test]
fn test_import_file_then_recompute() {
    let db = Database::in_memory().unwrap();
    let user = db.get_or_create_user("file@example.com").unwrap().id;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "date,description,amount,category\n{}03/10/2024,BEST BUY,-151.00,Electronics\n",
        ELECTRONICS_HISTORY
    )
    .unwrap();

    let stats = import_csv_file(&db, user, file.path()).unwrap();
    assert_eq!(stats.inserted, 4);

    let again = import_csv_file(&db, user, file.path()).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 4);

    let service = AlertService::new(db);
    service.recompute(user, march()).unwrap();
    let large = alerts_of(&service, user, AlertType::LargeTransaction);
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].merchant.as_deref(), Some("Best Buy"));
}

#[test]
fn test_missing_file_is_io_error() {
    let db = Database::in_memory().unwrap();
    let result = import_csv_file(&db, 1, "/nonexistent/vigil/transactions.csv");
    assert!(matches!(result, Err(Error::Io(_))));
}

// =============================================================================
// Recompute properties
// =============================================================================

#[test]
fn test_recompute_is_idempotent() {
    let rows = format!(
        "{}2024-03-10,BEST BUY,-400.00,Electronics\n\
         2024-03-11,CORNER DELI,-9.00,Dining\n",
        ELECTRONICS_HISTORY
    );
    let (service, user) = setup("idem@example.com", &rows);

    let first = service.recompute(user, march()).unwrap();
    assert!(first.generated > 0);
    let before = signatures(&service.db().list_user_alerts(user).unwrap());

    let second = service.recompute(user, march()).unwrap();
    assert_eq!(second.replaced, first.generated);
    assert_eq!(second.generated, first.generated);
    let after = signatures(&service.db().list_user_alerts(user).unwrap());
    assert_eq!(before, after);

    let summary = service.summary(user).unwrap();
    assert_eq!(summary.last_generated_count, Some(first.generated as i64));
}

#[test]
fn test_user_actions_survive_recompute() {
    let rows = format!(
        "{}2024-03-10,BEST BUY,-400.00,Electronics\n\
         2024-03-11,CORNER DELI,-9.00,Dining\n",
        ELECTRONICS_HISTORY
    );
    let (service, user) = setup("keep@example.com", &rows);
    service.recompute(user, march()).unwrap();

    let large = alerts_of(&service, user, AlertType::LargeTransaction).remove(0);
    let deli = alerts_of(&service, user, AlertType::NewMerchant)
        .into_iter()
        .find(|a| a.merchant.as_deref() == Some("Corner Deli"))
        .unwrap();

    let acked = service.acknowledge(user, large.id).unwrap();
    let dismissed = service.dismiss(user, deli.id).unwrap();

    service.recompute(user, march()).unwrap();

    let all = service.db().list_user_alerts(user).unwrap();
    for kept in [&acked, &dismissed] {
        let same: Vec<&Alert> = all
            .iter()
            .filter(|a| a.signature() == kept.signature())
            .collect();
        assert_eq!(same.len(), 1, "alert {} was recreated", kept.id);
        assert_eq!(same[0].id, kept.id);
        assert_eq!(same[0].acknowledged, kept.acknowledged);
        assert_eq!(same[0].acknowledged_at, kept.acknowledged_at);
        assert_eq!(same[0].dismissed_at, kept.dismissed_at);
    }
}

#[test]
fn test_same_day_new_merchant_flagged_once() {
    let rows = "\
2024-03-02,CORNER DELI,-8.00,Dining
2024-03-02,CORNER DELI,-9.00,Dining
";
    let (service, user) = setup("deli@example.com", rows);
    service.recompute(user, march()).unwrap();

    let new_merchant = alerts_of(&service, user, AlertType::NewMerchant);
    assert_eq!(new_merchant.len(), 1);
    assert_eq!(new_merchant[0].merchant.as_deref(), Some("Corner Deli"));
}

#[test]
fn test_category_without_history_never_spikes() {
    let rows = "2024-03-15,GADGETS,-5000.00,Electronics\n";
    let (service, user) = setup("nohistory@example.com", rows);
    service.recompute(user, march()).unwrap();

    assert!(alerts_of(&service, user, AlertType::CategorySpike).is_empty());
    assert!(alerts_of(&service, user, AlertType::LargeTransaction).is_empty());
}

#[test]
fn test_large_transaction_threshold_is_strict() {
    let rows = format!(
        "{}2024-03-10,BEST BUY,-151.00,Electronics\n\
         2024-03-12,GADGETS,-150.00,Electronics\n",
        ELECTRONICS_HISTORY
    );
    let (service, user) = setup("threshold@example.com", &rows);
    service.recompute(user, march()).unwrap();

    let large = alerts_of(&service, user, AlertType::LargeTransaction);
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].amount, 151.0);
    // 151 is under 1.25 × 150
    assert_eq!(large[0].severity, Severity::Moderate);
}

#[test]
fn test_frequency_window() {
    let burst = "\
2024-03-01,BEAN BAR,-5.00,Dining
2024-03-01,BEAN BAR,-6.00,Dining
2024-03-02,BEAN BAR,-5.50,Dining
2024-03-03,BEAN BAR,-4.00,Dining
2024-03-03,BEAN BAR,-7.00,Dining
";
    let (service, user) = setup("burst@example.com", burst);
    service.recompute(user, march()).unwrap();
    let flagged = alerts_of(&service, user, AlertType::Frequency);
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].txn_date.to_string(), "2024-03-01");

    let spread = "\
2024-03-01,BEAN BAR,-5.00,Dining
2024-03-01,BEAN BAR,-6.00,Dining
2024-03-02,BEAN BAR,-5.50,Dining
2024-03-04,BEAN BAR,-4.00,Dining
2024-03-04,BEAN BAR,-7.00,Dining
";
    let (service, user) = setup("spread@example.com", spread);
    service.recompute(user, march()).unwrap();
    assert!(alerts_of(&service, user, AlertType::Frequency).is_empty());
}

#[test]
fn test_absolute_override_escalates_severity() {
    let rows = format!(
        "{}2024-03-10,BEST BUY,-1200.00,Electronics\n\
         2024-03-12,GADGETS,-800.00,Electronics\n",
        ELECTRONICS_HISTORY
    );
    let (service, user) = setup("severity@example.com", &rows);
    service
        .update_settings(
            user,
            &AlertThresholds {
                critical_large_absolute: Some(1000.0),
                ..Default::default()
            },
        )
        .unwrap();
    service.recompute(user, march()).unwrap();

    let mut large = alerts_of(&service, user, AlertType::LargeTransaction);
    large.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    assert_eq!(large.len(), 2);
    assert_eq!(large[0].severity, Severity::Critical);
    assert_eq!(large[1].severity, Severity::Moderate);
}

// =============================================================================
// Ownership and suppression
// =============================================================================

#[test]
fn test_other_users_alerts_are_forbidden() {
    let (service, owner) = setup(
        "owner@example.com",
        "2024-03-02,CORNER DELI,-8.00,Dining\n",
    );
    let intruder = service
        .db()
        .get_or_create_user("intruder@example.com")
        .unwrap()
        .id;
    service.recompute(owner, march()).unwrap();
    let alert = alerts_of(&service, owner, AlertType::NewMerchant).remove(0);

    assert!(matches!(
        service.acknowledge(intruder, alert.id),
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        service.dismiss(intruder, alert.id),
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        service.acknowledge(owner, 999_999),
        Err(Error::NotFound(_))
    ));

    let unchanged = service.get(owner, alert.id).unwrap();
    assert!(!unchanged.acknowledged && !unchanged.dismissed);
    assert_eq!(unchanged.updated_at, alert.updated_at);
    assert_eq!(service.audit_trail(owner, alert.id).unwrap().len(), 1);
}

#[test]
fn test_whitelisted_merchant_is_silent() {
    let rows = format!("{}2024-03-10,BEST BUY,-900.00,Electronics\n", ELECTRONICS_HISTORY);
    let (service, user) = setup("whitelist@example.com", &rows);
    service.add_whitelist(user, "best buy").unwrap();
    service.recompute(user, march()).unwrap();

    for alert_type in [
        AlertType::LargeTransaction,
        AlertType::NewMerchant,
        AlertType::Frequency,
    ] {
        assert!(
            alerts_of(&service, user, alert_type).is_empty(),
            "{} fired for a whitelisted merchant",
            alert_type.as_str()
        );
    }
}

#[test]
fn test_future_muted_category_is_silent() {
    let rows = "\
2023-12-05,SKYWAYS,-100.00,Travel
2024-01-05,SKYWAYS,-100.00,Travel
2024-02-05,SKYWAYS,-100.00,Travel
2024-03-10,SKYWAYS,-900.00,Travel
";
    let (service, user) = setup("mute@example.com", rows);
    let until = Local::now().date_naive() + Duration::days(30);
    service.mute_category(user, "travel", Some(until)).unwrap();
    service.recompute(user, march()).unwrap();

    assert!(alerts_of(&service, user, AlertType::LargeTransaction).is_empty());
    assert!(alerts_of(&service, user, AlertType::CategorySpike).is_empty());
    // Merchant-based detection still runs
    assert_eq!(alerts_of(&service, user, AlertType::NewMerchant).len(), 1);

    // Lifting the mute brings the alerts back
    service.unmute_category(user, "Travel").unwrap();
    service.recompute(user, march()).unwrap();
    assert_eq!(alerts_of(&service, user, AlertType::LargeTransaction).len(), 1);
    assert_eq!(alerts_of(&service, user, AlertType::CategorySpike).len(), 1);
}

// =============================================================================
// Batch and stream
// =============================================================================

#[test]
fn test_recompute_all_users_keeps_users_apart() {
    let db = Database::in_memory().unwrap();
    let alice = import_user(&db, "alice@example.com", "2024-03-02,CORNER DELI,-8.00,Dining\n");
    let bob = import_user(
        &db,
        "bob@example.com",
        "2024-03-02,BEAN BAR,-5.00,Dining\n2024-03-03,SKYWAYS,-300.00,Travel\n",
    );
    let service = AlertService::new(db);

    let batch = service.recompute_all_users(march()).unwrap();
    assert_eq!(batch.users, 2);
    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failed, 0);
    assert_eq!(batch.generated, 3);

    assert_eq!(service.db().list_user_alerts(alice).unwrap().len(), 1);
    assert!(service
        .db()
        .list_user_alerts(bob)
        .unwrap()
        .iter()
        .all(|a| a.user_id == bob));
}

#[test]
fn test_stream_drops_closed_and_full_subscribers() {
    let rows = "\
2024-03-02,CORNER DELI,-8.00,Dining
2024-03-03,BEAN BAR,-5.00,Dining
2024-03-04,SKYWAYS,-300.00,Travel
";
    let (service, user) = setup("stream@example.com", rows);
    let service = service.with_publisher(StreamPublisher::with_buffer(1));
    service.recompute(user, march()).unwrap();
    let alerts = service.db().list_user_alerts(user).unwrap();
    assert_eq!(alerts.len(), 3);

    let publisher = service.publisher();
    let closed = publisher.subscribe();
    let _full = publisher.subscribe();
    let mut live = publisher.subscribe();
    drop(closed);

    // The closed subscriber goes on the first event, the unread one on the second
    assert_eq!(publisher.publish(StreamEventKind::New, &alerts[0]), 2);
    assert_eq!(live.try_recv().map(|e| e.alert.id), Some(alerts[0].id));

    assert_eq!(publisher.publish(StreamEventKind::New, &alerts[1]), 1);
    assert_eq!(live.try_recv().map(|e| e.alert.id), Some(alerts[1].id));
    assert_eq!(publisher.subscriber_count(), 1);

    // Acknowledging publishes to the surviving subscriber
    service.acknowledge(user, alerts[2].id).unwrap();
    let event = live.try_recv().unwrap();
    assert_eq!(event.kind, StreamEventKind::Acknowledged);
    assert_eq!(event.user_id, user);
}

/// Notifier whose every delivery fails
#[derive(Default)]
struct FailingNotifier {
    calls: AtomicUsize,
}

impl AlertNotifier for FailingNotifier {
    fn maybe_send_alert(&self, _alert: &Alert) -> vigil_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::NotificationDelivery("smtp unreachable".to_string()))
    }
}

#[test]
fn test_recompute_side_effects_survive_failing_notifier() {
    let (service, user) = setup("effects@example.com", "2024-03-02,CORNER DELI,-8.00,Dining\n");
    let notifier = Arc::new(FailingNotifier::default());
    let service = service.with_notifier(notifier.clone());
    let mut events = service.publisher().subscribe();

    let result = service.recompute(user, march()).unwrap();
    assert_eq!(result.generated, 1);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

    let created = events.try_recv().unwrap();
    assert_eq!(created.kind, StreamEventKind::New);
    assert_eq!(created.user_id, user);
    assert_eq!(created.alert.alert_type, AlertType::NewMerchant);
    assert!(events.try_recv().is_none());

    let id = created.alert.id;
    let trail: Vec<AuditAction> = service
        .audit_trail(user, id)
        .unwrap()
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(trail, vec![AuditAction::Created]);

    service.dismiss(user, id).unwrap();
    let kinds: Vec<StreamEventKind> = std::iter::from_fn(|| events.try_recv())
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![StreamEventKind::Dismissed, StreamEventKind::Updated]);
}

#[test]
fn test_acknowledge_publishes_then_updates() {
    let (service, user) = setup("ackevents@example.com", "2024-03-02,CORNER DELI,-8.00,Dining\n");
    service.recompute(user, march()).unwrap();
    let id = service.db().list_user_alerts(user).unwrap()[0].id;

    let mut events = service.publisher().subscribe();
    service.acknowledge(user, id).unwrap();

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv()).collect();
    let kinds: Vec<StreamEventKind> = received.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![StreamEventKind::Acknowledged, StreamEventKind::Updated]);
    assert!(received.iter().all(|e| e.alert.id == id && e.alert.acknowledged));

    let trail: Vec<AuditAction> = service
        .audit_trail(user, id)
        .unwrap()
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(trail, vec![AuditAction::Created, AuditAction::Acknowledged]);
}
