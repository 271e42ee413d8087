//! Detection rules and the registry that runs them
//!
//! A rule looks at one period of one user's transactions and returns
//! candidate alerts. Rules never touch storage; everything they need is in
//! the [`RuleContext`]. The registry runs rules in registration order and
//! isolates failures: a rule that errors is logged and skipped.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{AlertThresholds, AlertType, CandidateAlert, Transaction};

use super::baseline::Baselines;

mod category_spike;
mod frequency;
mod large_transaction;
mod new_merchant;

pub use category_spike::CategorySpikeRule;
pub use frequency::FrequencyRule;
pub use large_transaction::LargeTransactionRule;
pub use new_merchant::NewMerchantRule;

/// Everything a rule may read during one pass
pub struct RuleContext<'a> {
    pub user_id: i64,
    /// First day of the period
    pub from: NaiveDate,
    /// Last day of the period
    pub to: NaiveDate,
    /// The period's transactions, oldest first
    pub transactions: &'a [Transaction],
    pub thresholds: &'a AlertThresholds,
    pub baselines: &'a Baselines,
    /// Whitelisted merchants, lowercased
    pub whitelist: &'a HashSet<String>,
    /// Actively muted categories, lowercased
    pub muted: &'a HashSet<String>,
}

impl RuleContext<'_> {
    pub fn is_whitelisted(&self, merchant: &str) -> bool {
        !merchant.is_empty() && self.whitelist.contains(&merchant.to_lowercase())
    }

    pub fn is_muted(&self, category: &str) -> bool {
        !category.is_empty() && self.muted.contains(&category.to_lowercase())
    }

    /// Baseline for a category key; 0 when there is no history
    pub fn baseline(&self, category: &str) -> f64 {
        self.baselines.get(category).copied().unwrap_or(0.0)
    }
}

/// A pluggable anomaly detector
pub trait Rule: Send + Sync {
    /// Alert type this rule produces
    fn key(&self) -> AlertType;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Produce candidate alerts for the period
    fn detect(&self, ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>>;
}

/// Ordered set of rules invoked on every pass
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Registry with the built-in rules
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Box::new(LargeTransactionRule));
        registry.register(Box::new(FrequencyRule));
        registry.register(Box::new(CategorySpikeRule));
        registry.register(Box::new(NewMerchantRule));

        registry
    }

    /// Registry with no rules
    pub fn empty() -> Self {
        Self { rules: vec![] }
    }

    /// Register a rule; it runs after every rule registered before it
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule and collect candidates in rule order
    pub fn run(&self, ctx: &RuleContext<'_>) -> Vec<CandidateAlert> {
        let mut candidates = vec![];

        for rule in &self.rules {
            match rule.detect(ctx) {
                Ok(found) => {
                    tracing::debug!(
                        rule = rule.key().as_str(),
                        user_id = ctx.user_id,
                        count = found.len(),
                        "Rule complete"
                    );
                    candidates.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        rule = rule.key().as_str(),
                        user_id = ctx.user_id,
                        error = %e,
                        "Rule failed, skipping"
                    );
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builders for rule unit tests

    use super::*;
    use crate::alerts::baseline::Baselines;

    pub fn txn(
        id: i64,
        date: NaiveDate,
        merchant: &str,
        category: Option<&str>,
        amount: f64,
    ) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            date,
            description: merchant.to_string(),
            merchant: if merchant.is_empty() {
                None
            } else {
                Some(merchant.to_string())
            },
            category: category.map(str::to_string),
            amount,
        }
    }

    /// Owned inputs for a [`RuleContext`]
    pub struct Fixture {
        pub from: NaiveDate,
        pub to: NaiveDate,
        pub transactions: Vec<Transaction>,
        pub thresholds: AlertThresholds,
        pub baselines: Baselines,
        pub whitelist: HashSet<String>,
        pub muted: HashSet<String>,
    }

    impl Fixture {
        pub fn new(transactions: Vec<Transaction>) -> Self {
            Self {
                from: crate::test_utils::ymd(2024, 3, 1),
                to: crate::test_utils::ymd(2024, 3, 31),
                transactions,
                thresholds: AlertThresholds::default(),
                baselines: Baselines::new(),
                whitelist: HashSet::new(),
                muted: HashSet::new(),
            }
        }

        pub fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                user_id: 1,
                from: self.from,
                to: self.to,
                transactions: &self.transactions,
                thresholds: &self.thresholds,
                baselines: &self.baselines,
                whitelist: &self.whitelist,
                muted: &self.muted,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::Error;
    use crate::test_utils::ymd;

    struct BrokenRule;

    impl Rule for BrokenRule {
        fn key(&self) -> AlertType {
            AlertType::Frequency
        }

        fn name(&self) -> &'static str {
            "Broken"
        }

        fn detect(&self, _ctx: &RuleContext<'_>) -> Result<Vec<CandidateAlert>> {
            Err(Error::RuleExecution {
                rule: "broken".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_builtin_order() {
        let registry = RuleRegistry::new();
        assert_eq!(
            registry.names(),
            vec!["Large Transaction", "Frequency", "Category Spike", "New Merchant"]
        );
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let mut registry = RuleRegistry::empty();
        registry.register(Box::new(BrokenRule));
        registry.register(Box::new(NewMerchantRule));

        let fixture = Fixture::new(vec![txn(1, ymd(2024, 3, 4), "Cafe", None, -5.0)]);
        let candidates = registry.run(&fixture.ctx());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].alert_type, AlertType::NewMerchant);
    }

    #[test]
    fn test_suppression_lookups_ignore_case() {
        let mut fixture = Fixture::new(vec![]);
        fixture.whitelist.insert("netflix".to_string());
        fixture.muted.insert("travel".to_string());
        let ctx = fixture.ctx();

        assert!(ctx.is_whitelisted("NetFlix"));
        assert!(ctx.is_muted("TRAVEL"));
        assert!(!ctx.is_whitelisted(""));
        assert_eq!(ctx.baseline("Groceries"), 0.0);
    }
}
