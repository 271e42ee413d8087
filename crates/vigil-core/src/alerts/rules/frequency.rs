//! Bursts of transactions at one merchant

use std::collections::BTreeMap;

use super::{Rule, RuleContext};
use crate::error::Result;
use crate::models::{AlertMetadata, AlertType, CandidateAlert, Transaction};

/// Flags a merchant that sees more than `freq_max_txn` transactions inside
/// one `freq_window_hours` window
///
/// Windows are measured between the start of each transaction's day, so a
/// 48 hour window starting on the 1st includes everything dated up to the
/// 3rd. Each merchant is flagged at most once, on the earliest transaction
/// that opens a crowded window.
pub struct FrequencyRule;

impl Rule for FrequencyRule {
    fn key(&self) -> AlertType {
        AlertType::Frequency
    }

    fn name(&self) -> &'static str {
        "Frequency"
    }

    fn detect(&self, ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>> {
        let t = ctx.thresholds;

        let mut by_merchant: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for txn in ctx.transactions {
            let merchant = txn.merchant_name().trim();
            if merchant.is_empty() || ctx.is_whitelisted(merchant) {
                continue;
            }
            if txn.amount.abs() < t.freq_min_amount {
                continue;
            }
            by_merchant
                .entry(merchant.to_lowercase())
                .or_default()
                .push(txn);
        }

        let mut found = vec![];
        for txns in by_merchant.values_mut() {
            txns.sort_by_key(|txn| txn.date);

            for (i, start) in txns.iter().enumerate() {
                let count = 1 + txns[i + 1..]
                    .iter()
                    .take_while(|other| {
                        (other.date - start.date).num_hours() <= t.freq_window_hours
                    })
                    .count();

                if count as i64 > t.freq_max_txn {
                    let mut alert = CandidateAlert::new(
                        AlertType::Frequency,
                        start.amount.abs(),
                        start.date,
                        AlertMetadata::Frequency {
                            count,
                            window_hours: t.freq_window_hours,
                            min_amount: t.freq_min_amount,
                        },
                    )
                    .with_category(start.category.clone())
                    .with_txn_id(start.id);
                    alert.merchant = start.merchant.clone();
                    found.push(alert);
                    break;
                }
            }
        }

        Ok(found)
    }
}
