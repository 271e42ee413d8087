//! Single outflows well above the category's usual monthly spend

use super::{Rule, RuleContext};
use crate::error::Result;
use crate::models::{AlertMetadata, AlertType, CandidateAlert};

/// Flags an outflow whose size exceeds `max(baseline * multiplier, min_amount)`
///
/// Whitelisted merchants, muted categories and categories without history
/// are skipped.
pub struct LargeTransactionRule;

impl Rule for LargeTransactionRule {
    fn key(&self) -> AlertType {
        AlertType::LargeTransaction
    }

    fn name(&self) -> &'static str {
        "Large Transaction"
    }

    fn detect(&self, ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>> {
        let t = ctx.thresholds;
        let mut found = vec![];

        for txn in ctx.transactions.iter().filter(|t| t.is_outflow()) {
            if ctx.is_whitelisted(txn.merchant_name()) || ctx.is_muted(txn.category_key()) {
                continue;
            }

            let baseline = ctx.baseline(txn.category_key());
            if baseline <= 0.0 {
                continue;
            }

            let threshold = (baseline * t.large_multiplier).max(t.large_min_amount);
            let amount = txn.amount.abs();
            if amount <= threshold {
                continue;
            }

            let mut alert = CandidateAlert::new(
                AlertType::LargeTransaction,
                amount,
                txn.date,
                AlertMetadata::LargeTransaction {
                    baseline_avg: baseline,
                    multiplier: t.large_multiplier,
                    min_amount: t.large_min_amount,
                    threshold,
                },
            )
            .with_category(txn.category.clone())
            .with_txn_id(txn.id);
            alert.merchant = txn.merchant.clone();
            found.push(alert);
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{txn, Fixture};
    use super::*;
    use crate::test_utils::ymd;

    fn fixture(amounts: &[f64]) -> Fixture {
        let txns = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| {
                txn(
                    i as i64 + 1,
                    ymd(2024, 3, 5),
                    "Best Buy",
                    Some("Electronics"),
                    *a,
                )
            })
            .collect();
        let mut f = Fixture::new(txns);
        f.baselines.insert("Electronics".to_string(), 100.0);
        f
    }

    #[test]
    fn test_threshold_is_strict() {
        let f = fixture(&[-151.0, -150.0]);
        let found = LargeTransactionRule.detect(&f.ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, 151.0);
        assert_eq!(found[0].txn_id, Some(1));
        assert_eq!(
            found[0].metadata,
            AlertMetadata::LargeTransaction {
                baseline_avg: 100.0,
                multiplier: 1.5,
                min_amount: 0.0,
                threshold: 150.0,
            }
        );
    }

    #[test]
    fn test_min_amount_raises_threshold() {
        let mut f = fixture(&[-151.0, -300.0]);
        f.thresholds.large_min_amount = 200.0;
        let found = LargeTransactionRule.detect(&f.ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, 300.0);
    }

    #[test]
    fn test_inflows_ignored() {
        let f = fixture(&[500.0]);
        assert!(LargeTransactionRule.detect(&f.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_baseline_disables() {
        let mut f = fixture(&[-10_000.0]);
        f.baselines.clear();
        assert!(LargeTransactionRule.detect(&f.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_whitelist_and_mute_suppress() {
        let mut f = fixture(&[-1_000.0]);
        f.whitelist.insert("best buy".to_string());
        assert!(LargeTransactionRule.detect(&f.ctx()).unwrap().is_empty());

        let mut f = fixture(&[-1_000.0]);
        f.muted.insert("electronics".to_string());
        assert!(LargeTransactionRule.detect(&f.ctx()).unwrap().is_empty());
    }
}
