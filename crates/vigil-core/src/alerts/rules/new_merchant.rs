//! First spend at each merchant within the period

use std::collections::HashSet;

use super::{Rule, RuleContext};
use crate::error::Result;
use crate::models::{AlertMetadata, AlertType, CandidateAlert};

/// Flags the first qualifying outflow per merchant in the period
///
/// "New" is relative to the pass only: a merchant seen in earlier months is
/// still flagged once per period.
pub struct NewMerchantRule;

impl Rule for NewMerchantRule {
    fn key(&self) -> AlertType {
        AlertType::NewMerchant
    }

    fn name(&self) -> &'static str {
        "New Merchant"
    }

    fn detect(&self, ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>> {
        let min_amount = ctx.thresholds.new_merchant_min_amount;
        let mut seen = HashSet::new();
        let mut found = vec![];

        for txn in ctx.transactions.iter().filter(|t| t.is_outflow()) {
            let merchant = txn.merchant_name().trim();
            if merchant.is_empty() || ctx.is_whitelisted(merchant) {
                continue;
            }
            if txn.amount.abs() < min_amount {
                continue;
            }
            if !seen.insert(merchant.to_lowercase()) {
                continue;
            }

            found.push(
                CandidateAlert::new(
                    AlertType::NewMerchant,
                    txn.amount.abs(),
                    txn.date,
                    AlertMetadata::NewMerchant { min_amount },
                )
                .with_merchant(merchant)
                .with_category(txn.category.clone())
                .with_txn_id(txn.id),
            );
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{txn, Fixture};
    use super::*;
    use crate::test_utils::ymd;

    #[test]
    fn test_first_spend_per_merchant() {
        let f = Fixture::new(vec![
            txn(1, ymd(2024, 3, 2), "Corner Deli", Some("Dining"), -8.0),
            txn(2, ymd(2024, 3, 2), "corner deli", Some("Dining"), -9.0),
            txn(3, ymd(2024, 3, 5), "Hardware Hut", None, -45.0),
            txn(4, ymd(2024, 3, 6), "Refund Co", None, 30.0),
        ]);

        let found = NewMerchantRule.detect(&f.ctx()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].txn_id, Some(1));
        assert_eq!(found[0].merchant.as_deref(), Some("Corner Deli"));
        assert_eq!(found[1].txn_id, Some(3));
    }

    #[test]
    fn test_below_minimum_does_not_claim_merchant() {
        let mut f = Fixture::new(vec![
            txn(1, ymd(2024, 3, 2), "Gadget Shop", None, -5.0),
            txn(2, ymd(2024, 3, 3), "Gadget Shop", None, -80.0),
        ]);
        f.thresholds.new_merchant_min_amount = 50.0;

        let found = NewMerchantRule.detect(&f.ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].txn_id, Some(2));
    }

    #[test]
    fn test_whitelisted_merchant_skipped() {
        let mut f = Fixture::new(vec![txn(1, ymd(2024, 3, 2), "Netflix", None, -15.0)]);
        f.whitelist.insert("netflix".to_string());
        assert!(NewMerchantRule.detect(&f.ctx()).unwrap().is_empty());
    }
}
