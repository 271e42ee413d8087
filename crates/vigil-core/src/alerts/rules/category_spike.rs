//! Category totals far above their trailing baseline

use std::collections::BTreeMap;

use super::{Rule, RuleContext};
use crate::alerts::baseline::round_cents;
use crate::error::Result;
use crate::models::{AlertMetadata, AlertType, CandidateAlert};

/// Flags a category whose period outflow exceeds
/// `max(baseline * cat_spike_multiplier, cat_spike_min_amount)`
///
/// The alert is dated on the last day of the period and carries no
/// transaction reference.
pub struct CategorySpikeRule;

impl Rule for CategorySpikeRule {
    fn key(&self) -> AlertType {
        AlertType::CategorySpike
    }

    fn name(&self) -> &'static str {
        "Category Spike"
    }

    fn detect(&self, ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>> {
        let t = ctx.thresholds;

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for txn in ctx.transactions.iter().filter(|t| t.is_outflow()) {
            let category = txn.category_key();
            if ctx.is_muted(category) {
                continue;
            }
            *totals.entry(category).or_insert(0.0) += txn.amount.abs();
        }

        let mut found = vec![];
        for (category, total) in totals {
            let baseline = ctx.baseline(category);
            if baseline <= 0.0 {
                continue;
            }

            let spike_threshold = baseline * t.cat_spike_multiplier;
            let total = round_cents(total);
            if total <= spike_threshold.max(t.cat_spike_min_amount) {
                continue;
            }

            let category = (!category.is_empty()).then(|| category.to_string());
            found.push(
                CandidateAlert::new(
                    AlertType::CategorySpike,
                    total,
                    ctx.to,
                    AlertMetadata::CategorySpike {
                        baseline_avg: baseline,
                        multiplier: t.cat_spike_multiplier,
                        threshold: spike_threshold,
                        ratio: total / baseline,
                        lookback_months: t.cat_spike_lookback_months,
                    },
                )
                .with_category(category),
            );
        }

        Ok(found)
    }
}
