//! User-facing alert operations
//!
//! Every operation takes the caller's user id. Operations on a single alert
//! check ownership first: an unknown id is `NotFound`, another user's alert
//! is `Forbidden`, and neither changes any state.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use super::engine::AlertService;
use crate::error::{Error, Result};
use crate::merchant::normalize_merchant;
use crate::models::{
    Alert, AlertAuditEntry, AlertQuery, AlertSettings, AlertSummary, AlertThresholds, AlertType,
    AuditAction, BatchRecomputeResult, MutedCategory, Page, Recommendation, Severity,
    WhitelistEntry, YearMonth,
};
use crate::recommendations;
use crate::stream::StreamEventKind;

/// Longest accepted merchant or category name
pub const MAX_NAME_LEN: usize = 255;

/// A page of alerts together with the user's summary
#[derive(Debug, Clone, Serialize)]
pub struct AlertListing {
    pub page: Page<Alert>,
    pub summary: AlertSummary,
}

/// Description of one alert type for clients
#[derive(Debug, Clone, Serialize)]
pub struct AlertTypeInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub severity: &'static str,
}

/// Static description of what the engine produces
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub types: Vec<AlertTypeInfo>,
    pub severities: Vec<&'static str>,
    pub stream_events: Vec<&'static str>,
}

impl Capabilities {
    pub fn describe() -> Self {
        Self {
            types: AlertType::ALL
                .iter()
                .map(|t| AlertTypeInfo {
                    key: t.as_str(),
                    label: t.label(),
                    severity: t.advertised_severity().as_str(),
                })
                .collect(),
            severities: vec![Severity::Critical.as_str(), Severity::Moderate.as_str()],
            stream_events: StreamEventKind::ALL.iter().map(|k| k.as_str()).collect(),
        }
    }
}

fn validate_name(kind: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} must not be blank", kind)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "{} must be at most {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

impl AlertService {
    // ========== Reading ==========

    /// Search the caller's non-dismissed alerts
    pub fn list(&self, user_id: i64, query: &AlertQuery) -> Result<Page<Alert>> {
        let month = query.month.unwrap_or_else(YearMonth::current);
        let (items, total) =
            self.db
                .search_alerts(user_id, month.first_day(), month.last_day(), query)?;
        Ok(Page::new(items, query.page, query.page_size(), total))
    }

    /// Search plus summary in one response
    pub fn list_with_summary(&self, user_id: i64, query: &AlertQuery) -> Result<AlertListing> {
        Ok(AlertListing {
            page: self.list(user_id, query)?,
            summary: self.summary(user_id)?,
        })
    }

    /// Get one of the caller's alerts
    pub fn get(&self, user_id: i64, alert_id: i64) -> Result<Alert> {
        let alert = self
            .db
            .get_alert(alert_id)?
            .ok_or_else(|| Error::NotFound(format!("Alert {}", alert_id)))?;
        if alert.user_id != user_id {
            return Err(Error::Forbidden(format!("Alert {}", alert_id)));
        }
        Ok(alert)
    }

    /// Open alert counts and the last pass's bookkeeping
    pub fn summary(&self, user_id: i64) -> Result<AlertSummary> {
        let (critical_open, moderate_open, acknowledged_open, total) =
            self.db.count_open_alerts(user_id)?;
        let settings = self.db.get_alert_settings(user_id)?;
        Ok(AlertSummary {
            critical_open,
            moderate_open,
            acknowledged_open,
            total,
            last_generated_count: settings.as_ref().and_then(|s| s.last_generated_count),
            last_generated_at: settings.and_then(|s| s.last_generated_at),
        })
    }

    /// Audit trail of one of the caller's alerts
    pub fn audit_trail(&self, user_id: i64, alert_id: i64) -> Result<Vec<AlertAuditEntry>> {
        self.get(user_id, alert_id)?;
        self.db.list_alert_audit(alert_id)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::describe()
    }

    // ========== Acknowledge / dismiss ==========

    /// Acknowledge an alert; repeat calls keep the first timestamp
    pub fn acknowledge(&self, user_id: i64, alert_id: i64) -> Result<Alert> {
        self.get(user_id, alert_id)?;
        self.apply_acknowledge(user_id, alert_id)
    }

    /// Dismiss an alert, hiding it from listings
    pub fn dismiss(&self, user_id: i64, alert_id: i64) -> Result<Alert> {
        self.get(user_id, alert_id)?;
        self.apply_dismiss(user_id, alert_id)
    }

    /// Acknowledge each of the caller's unacknowledged alerts in `ids`
    ///
    /// Unknown ids, other users' alerts and already acknowledged alerts are
    /// skipped. Returns the alerts that changed.
    pub fn bulk_acknowledge(&self, user_id: i64, ids: &[i64]) -> Result<Vec<Alert>> {
        let mut changed = vec![];
        for &id in ids {
            match self.db.get_alert(id)? {
                Some(a) if a.user_id == user_id && !a.acknowledged => {
                    changed.push(self.apply_acknowledge(user_id, id)?);
                }
                _ => debug!(user_id, alert_id = id, "Skipping bulk acknowledge"),
            }
        }
        Ok(changed)
    }

    /// Dismiss each of the caller's undismissed alerts in `ids`
    pub fn bulk_dismiss(&self, user_id: i64, ids: &[i64]) -> Result<Vec<Alert>> {
        let mut changed = vec![];
        for &id in ids {
            match self.db.get_alert(id)? {
                Some(a) if a.user_id == user_id && !a.dismissed => {
                    changed.push(self.apply_dismiss(user_id, id)?);
                }
                _ => debug!(user_id, alert_id = id, "Skipping bulk dismiss"),
            }
        }
        Ok(changed)
    }

    fn apply_acknowledge(&self, user_id: i64, alert_id: i64) -> Result<Alert> {
        let alert = self
            .db
            .mark_alert_acknowledged(alert_id)?
            .ok_or_else(|| Error::NotFound(format!("Alert {}", alert_id)))?;
        self.db.record_alert_audit(alert_id, user_id, AuditAction::Acknowledged)?;
        self.publisher.publish(StreamEventKind::Acknowledged, &alert);
        self.publisher.publish(StreamEventKind::Updated, &alert);
        Ok(alert)
    }

    fn apply_dismiss(&self, user_id: i64, alert_id: i64) -> Result<Alert> {
        let alert = self
            .db
            .mark_alert_dismissed(alert_id)?
            .ok_or_else(|| Error::NotFound(format!("Alert {}", alert_id)))?;
        self.db.record_alert_audit(alert_id, user_id, AuditAction::Dismissed)?;
        self.publisher.publish(StreamEventKind::Dismissed, &alert);
        self.publisher.publish(StreamEventKind::Updated, &alert);
        Ok(alert)
    }

    // ========== Settings ==========

    pub fn settings(&self, user_id: i64) -> Result<AlertSettings> {
        self.db.get_or_create_alert_settings(user_id)
    }

    /// Replace the caller's tunables after validating them
    pub fn update_settings(
        &self,
        user_id: i64,
        thresholds: &AlertThresholds,
    ) -> Result<AlertSettings> {
        thresholds.validate()?;
        let settings = self.db.update_alert_thresholds(user_id, thresholds)?;
        info!(user_id, "Alert settings updated");
        Ok(settings)
    }

    // ========== Whitelist ==========

    pub fn add_whitelist(&self, user_id: i64, merchant: &str) -> Result<WhitelistEntry> {
        let merchant = validate_name("Merchant", merchant)?;
        self.db.add_whitelist_merchant(user_id, &merchant)
    }

    pub fn list_whitelist(&self, user_id: i64) -> Result<Vec<WhitelistEntry>> {
        self.db.list_whitelist(user_id)
    }

    pub fn remove_whitelist(&self, user_id: i64, merchant: &str) -> Result<bool> {
        self.db.remove_whitelist_merchant(user_id, merchant.trim())
    }

    // ========== Muted categories ==========

    pub fn mute_category(
        &self,
        user_id: i64,
        category: &str,
        until: Option<NaiveDate>,
    ) -> Result<MutedCategory> {
        let category = validate_name("Category", category)?;
        self.db.mute_category(user_id, &category, until)
    }

    pub fn list_muted(&self, user_id: i64) -> Result<Vec<MutedCategory>> {
        self.db.list_muted_categories(user_id)
    }

    pub fn unmute_category(&self, user_id: i64, category: &str) -> Result<bool> {
        self.db.unmute_category(user_id, category.trim())
    }

    // ========== Recommendations ==========

    pub fn recommendations(&self, user_id: i64, month: YearMonth) -> Result<Vec<Recommendation>> {
        self.db.list_recommendations(user_id, month)
    }

    pub fn generate_recommendations(
        &self,
        user_id: i64,
        month: YearMonth,
    ) -> Result<Vec<Recommendation>> {
        recommendations::generate(&self.db, user_id, month)
    }

    pub fn generate_all_recommendations(&self, month: YearMonth) -> Result<BatchRecomputeResult> {
        recommendations::generate_all(&self.db, month)
    }

    // ========== Maintenance ==========

    /// Re-derive merchant names from descriptions in id-ordered batches
    ///
    /// Stops after `max_batches` batches or at the end of the table.
    /// Returns the number of transactions updated.
    pub fn normalize_merchants(&self, batch_size: usize, max_batches: usize) -> Result<usize> {
        let batch_size = batch_size.max(1) as i64;
        let mut after_id = 0;
        let mut updated = 0;

        for _ in 0..max_batches {
            let batch = self.db.list_transactions_after(after_id, batch_size)?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for txn in &batch {
                let source = txn.merchant.as_deref().unwrap_or(&txn.description);
                let derived = normalize_merchant(source);
                if derived != txn.merchant {
                    self.db.update_transaction_merchant(txn.id, derived.as_deref())?;
                    updated += 1;
                }
            }
        }

        info!(updated, "Merchant normalization complete");
        Ok(updated)
    }
}
