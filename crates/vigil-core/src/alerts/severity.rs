//! Severity classification and display text for candidate alerts

use crate::models::{AlertMetadata, AlertThresholds, AlertType, CandidateAlert, Severity};

/// Escalation factor over the large-transaction threshold when no absolute
/// override is configured
pub const LARGE_ESCALATION_FACTOR: f64 = 1.25;

/// Classify a candidate alert; anything not escalated is moderate
pub fn classify(alert: &CandidateAlert, t: &AlertThresholds) -> Severity {
    let critical = match (alert.alert_type, &alert.metadata) {
        (AlertType::LargeTransaction, meta) => match t.critical_large_absolute {
            Some(absolute) => alert.amount >= absolute,
            None => {
                let threshold = match meta {
                    AlertMetadata::LargeTransaction { threshold, .. } => *threshold,
                    _ => t.large_min_amount,
                };
                threshold > 0.0 && alert.amount > threshold * LARGE_ESCALATION_FACTOR
            }
        },
        (AlertType::CategorySpike, AlertMetadata::CategorySpike { ratio, .. }) => t
            .critical_category_spike_multiplier
            .is_some_and(|m| *ratio >= m),
        (AlertType::Frequency, AlertMetadata::Frequency { count, .. }) => t
            .critical_frequency_count
            .is_some_and(|c| *count as i64 >= c),
        (AlertType::NewMerchant, _) => t
            .critical_new_merchant_absolute
            .is_some_and(|a| alert.amount >= a),
        _ => false,
    };

    if critical {
        Severity::Critical
    } else {
        Severity::Moderate
    }
}

/// Default one-line description for a candidate
pub fn describe(alert: &CandidateAlert) -> String {
    match alert.alert_type {
        AlertType::LargeTransaction => {
            format!("Transaction exceeds typical amount ({:.2})", alert.amount)
        }
        AlertType::NewMerchant => format!(
            "First high-value spend at {}",
            alert.merchant.as_deref().unwrap_or("unknown merchant")
        ),
        AlertType::Frequency => "Multiple transactions detected in short window".to_string(),
        AlertType::CategorySpike => format!(
            "Spending spike in category {}",
            alert.category.as_deref().unwrap_or("Uncategorized")
        ),
    }
}

/// Fill in any severity, title, description or reason a rule left unset
pub fn finalize(alert: &mut CandidateAlert, t: &AlertThresholds) {
    if alert.severity.is_none() {
        alert.severity = Some(classify(alert, t));
    }
    if alert.title.is_none() {
        alert.title = Some(alert.alert_type.default_title().to_string());
    }
    if alert.description.is_none() {
        alert.description = Some(describe(alert));
    }
    if alert.reason.is_none() {
        alert.reason = Some(format!("Rule: {}", alert.alert_type.as_str()));
    }
}
