//! Recompute orchestration
//!
//! One pass covers one (user, month). It is safe to re-run: replaceable
//! alerts for the month are deleted and regenerated in a single storage
//! transaction, while acknowledged or dismissed alerts are left alone and
//! suppress any candidate with the same signature.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::baseline::compute_baselines;
use super::rules::{RuleContext, RuleRegistry};
use super::severity;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertThresholds, BatchRecomputeResult, CandidateAlert, NewAlert, RecomputeResult,
    Severity, YearMonth,
};
use crate::notify::{AlertNotifier, NoopNotifier};
use crate::stream::{StreamEventKind, StreamPublisher};

/// Default number of months covered by a backfill
pub const DEFAULT_BACKFILL_MONTHS: u32 = 6;
/// Largest allowed backfill
pub const MAX_BACKFILL_MONTHS: u32 = 24;

/// Alert engine: recompute passes plus the user-facing alert operations
///
/// Cheap to clone; clones share the database pool, rule registry,
/// publisher and notifier.
#[derive(Clone)]
pub struct AlertService {
    pub(super) db: Database,
    pub(super) publisher: StreamPublisher,
    notifier: Arc<dyn AlertNotifier>,
    rules: Arc<RuleRegistry>,
}

impl AlertService {
    /// Service with the built-in rules, a fresh publisher and no notifier
    pub fn new(db: Database) -> Self {
        Self {
            db,
            publisher: StreamPublisher::new(),
            notifier: Arc::new(NoopNotifier),
            rules: Arc::new(RuleRegistry::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_publisher(mut self, publisher: StreamPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// Recompute one user's alerts for one month
    pub fn recompute(&self, user_id: i64, month: YearMonth) -> Result<RecomputeResult> {
        let started = Instant::now();
        let (from, to) = (month.first_day(), month.last_day());

        let settings = self.db.get_or_create_alert_settings(user_id)?;
        let thresholds = &settings.thresholds;

        let today = chrono::Local::now().date_naive();
        let whitelist: HashSet<String> = self
            .db
            .list_whitelist(user_id)?
            .into_iter()
            .map(|w| w.merchant.to_lowercase())
            .collect();
        let muted: HashSet<String> = self
            .db
            .active_muted_categories(user_id, today)?
            .into_iter()
            .map(|m| m.category.to_lowercase())
            .collect();

        let (retained, replaceable): (Vec<Alert>, Vec<Alert>) = self
            .db
            .find_period_alerts(user_id, from, to)?
            .into_iter()
            .partition(Alert::is_retained);
        let retained_signatures: HashSet<String> =
            retained.iter().map(Alert::signature).collect();

        let baselines =
            compute_baselines(&self.db, user_id, from, thresholds.cat_spike_lookback_months)?;
        let transactions = self.db.find_transactions_in_range(user_id, from, to)?;

        let ctx = RuleContext {
            user_id,
            from,
            to,
            transactions: &transactions,
            thresholds,
            baselines: &baselines,
            whitelist: &whitelist,
            muted: &muted,
        };
        let candidates = self.rules.run(&ctx);
        let candidate_count = candidates.len();

        let survivors = reconcile(user_id, candidates, &retained_signatures, thresholds);
        let delete_ids: Vec<i64> = replaceable.iter().map(|a| a.id).collect();
        let inserted = self.db.replace_period_alerts(&delete_ids, &survivors)?;

        for alert in &inserted {
            self.publisher.publish(StreamEventKind::New, alert);
            if let Err(e) = self.notifier.maybe_send_alert(alert) {
                warn!(
                    user_id,
                    alert_id = alert.id,
                    error = %e,
                    "Alert notification failed"
                );
            }
        }

        self.db.record_generation(user_id, Utc::now(), inserted.len() as i64)?;

        let result = RecomputeResult {
            month,
            generated: inserted.len(),
            replaced: delete_ids.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            user_id,
            month = %month,
            candidates = candidate_count,
            retained = retained.len(),
            generated = result.generated,
            replaced = result.replaced,
            duration_ms = result.duration_ms,
            "Recompute complete"
        );

        Ok(result)
    }

    /// Recompute a month for every user, isolating per-user failures
    pub fn recompute_all_users(&self, month: YearMonth) -> Result<BatchRecomputeResult> {
        let users = self.db.list_users()?;
        let mut batch = BatchRecomputeResult {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            match self.recompute(user.id, month) {
                Ok(result) => {
                    batch.succeeded += 1;
                    batch.generated += result.generated;
                }
                Err(e) => {
                    batch.failed += 1;
                    warn!(
                        user_id = user.id,
                        month = %month,
                        error = %e,
                        "Recompute failed for user"
                    );
                }
            }
        }

        info!(
            month = %month,
            users = batch.users,
            succeeded = batch.succeeded,
            failed = batch.failed,
            generated = batch.generated,
            "Batch recompute complete"
        );
        Ok(batch)
    }

    /// Recompute the current month and the `months - 1` before it, oldest first
    pub fn backfill(&self, user_id: i64, months: u32) -> Result<Vec<RecomputeResult>> {
        if !(1..=MAX_BACKFILL_MONTHS).contains(&months) {
            return Err(Error::Validation(format!(
                "months must be between 1 and {}",
                MAX_BACKFILL_MONTHS
            )));
        }

        let current = YearMonth::current();
        (0..months)
            .rev()
            .map(|back| self.recompute(user_id, current.minus_months(back)))
            .collect()
    }
}

/// Finalize, deduplicate and filter candidates against retained alerts
fn reconcile(
    user_id: i64,
    candidates: Vec<CandidateAlert>,
    retained_signatures: &HashSet<String>,
    thresholds: &AlertThresholds,
) -> Vec<NewAlert> {
    let mut seen = HashSet::new();

    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let signature = candidate.signature();
            if !seen.insert(signature.clone()) || retained_signatures.contains(&signature) {
                return None;
            }
            severity::finalize(&mut candidate, thresholds);
            Some(into_new_alert(user_id, candidate))
        })
        .collect()
}

fn into_new_alert(user_id: i64, mut c: CandidateAlert) -> NewAlert {
    let description = match c.description.take() {
        Some(d) => d,
        None => severity::describe(&c),
    };
    NewAlert {
        user_id,
        alert_type: c.alert_type,
        severity: c.severity.unwrap_or(Severity::Moderate),
        title: c
            .title
            .unwrap_or_else(|| c.alert_type.default_title().to_string()),
        description,
        reason: c
            .reason
            .unwrap_or_else(|| format!("Rule: {}", c.alert_type.as_str())),
        amount: c.amount,
        merchant: c.merchant,
        category: c.category,
        txn_date: c.txn_date,
        txn_id: c.txn_id,
        metadata: c.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertMetadata, AlertType};
    use crate::test_utils::ymd;

    fn merchant_candidate(merchant: &str, txn_id: i64) -> CandidateAlert {
        CandidateAlert::new(
            AlertType::NewMerchant,
            10.0,
            ymd(2024, 3, 1),
            AlertMetadata::NewMerchant { min_amount: 0.0 },
        )
        .with_merchant(merchant)
        .with_txn_id(txn_id)
    }

    #[test]
    fn test_reconcile_first_signature_wins() {
        let mut second = merchant_candidate("Cafe", 1);
        second.title = Some("Second".to_string());
        let candidates = vec![
            merchant_candidate("Cafe", 1),
            second,
            merchant_candidate("Cafe", 2),
        ];

        let survivors = reconcile(7, candidates, &HashSet::new(), &AlertThresholds::default());
        assert_eq!(survivors.len(), 2);
        assert_eq!(survivors[0].title, "New Merchant");
        assert_eq!(survivors[0].user_id, 7);
        assert_eq!(survivors[0].reason, "Rule: new_merchant");
    }

    #[test]
    fn test_reconcile_skips_retained() {
        let retained: HashSet<String> =
            [merchant_candidate("Cafe", 1).signature()].into_iter().collect();
        let survivors = reconcile(
            7,
            vec![merchant_candidate("Cafe", 1), merchant_candidate("Deli", 3)],
            &retained,
            &AlertThresholds::default(),
        );
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].merchant.as_deref(), Some("Deli"));
    }

    #[test]
    fn test_backfill_bounds() {
        let service = AlertService::new(Database::in_memory().unwrap());
        assert!(matches!(service.backfill(1, 0), Err(Error::Validation(_))));
        assert!(matches!(service.backfill(1, 25), Err(Error::Validation(_))));
    }
}
