//! Category cap recommendations
//!
//! A lower-priority side job: for a month, look at the three whole months
//! before it and suggest a cap slightly under the average for the biggest
//! spending categories.

use tracing::{info, warn};

use crate::alerts::baseline::round_cents;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    BatchRecomputeResult, NewRecommendation, Recommendation, YearMonth, SUGGESTED_LIMIT,
};

/// Months of history behind a recommendation
pub const RECOMMENDATION_LOOKBACK_MONTHS: u32 = 3;
/// Categories recommended per month
pub const MAX_RECOMMENDATIONS: usize = 3;
/// Suggested cap as a fraction of the monthly average
pub const CAP_FACTOR: f64 = 0.9;

const PRIORITY: i64 = 10;
const ICON: &str = "target";
const RATIONALE: &str = "High spend category relative to others";

/// Regenerate one user's recommendations for `month`
pub fn generate(db: &Database, user_id: i64, month: YearMonth) -> Result<Vec<Recommendation>> {
    let start = month.minus_months(RECOMMENDATION_LOOKBACK_MONTHS).first_day();
    let end = month.minus_months(1).last_day();

    // Aggregates come back largest spend first
    let recs: Vec<NewRecommendation> = db
        .aggregate_category_outflows(user_id, start, end)?
        .into_iter()
        .filter_map(|agg| {
            let category = agg.category.filter(|c| !c.trim().is_empty())?;
            Some((category, agg.total_amount.abs()))
        })
        .take(MAX_RECOMMENDATIONS)
        .map(|(category, total)| {
            let avg = round_cents(total / RECOMMENDATION_LOOKBACK_MONTHS as f64);
            let cap = round_cents(avg * CAP_FACTOR);
            NewRecommendation {
                rec_type: SUGGESTED_LIMIT.to_string(),
                priority: PRIORITY,
                title: format!("Consider setting a limit for {}", category),
                message: format!(
                    "You spend about {:.2} a month on {}. A cap of {:.2} would save roughly {:.2}.",
                    avg,
                    category,
                    cap,
                    round_cents(avg - cap)
                ),
                icon: Some(ICON.to_string()),
                category: Some(category),
                current_monthly_avg: Some(avg),
                suggested_cap: Some(cap),
                rationale: Some(RATIONALE.to_string()),
            }
        })
        .collect();

    let stored = db.replace_recommendations(user_id, month, &recs)?;
    info!(user_id, month = %month, count = stored.len(), "Recommendations generated");
    Ok(stored)
}

/// Regenerate recommendations for every user, isolating per-user failures
pub fn generate_all(db: &Database, month: YearMonth) -> Result<BatchRecomputeResult> {
    let users = db.list_users()?;
    let mut batch = BatchRecomputeResult {
        users: users.len(),
        ..Default::default()
    };

    for user in &users {
        match generate(db, user.id, month) {
            Ok(recs) => {
                batch.succeeded += 1;
                batch.generated += recs.len();
            }
            Err(e) => {
                batch.failed += 1;
                warn!(
                    user_id = user.id,
                    month = %month,
                    error = %e,
                    "Recommendation generation failed"
                );
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_transaction, seed_user, ymd};

    #[test]
    fn test_top_three_categories() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, "recs@example.com");

        seed_transaction(&db, user, ymd(2024, 1, 5), "Landlord", Some("Rent"), -3000.0);
        seed_transaction(&db, user, ymd(2024, 2, 5), "Grocer", Some("Groceries"), -900.0);
        seed_transaction(&db, user, ymd(2024, 3, 5), "Bistro", Some("Dining"), -300.0);
        seed_transaction(&db, user, ymd(2024, 3, 9), "Cinema", Some("Fun"), -30.0);
        seed_transaction(&db, user, ymd(2024, 3, 9), "Cash", None, -5000.0);
        // Inside the target month: not part of the history
        seed_transaction(&db, user, ymd(2024, 4, 2), "Jeweler", Some("Gifts"), -9000.0);

        let recs = generate(&db, user, "2024-04".parse().unwrap()).unwrap();
        let categories: Vec<_> = recs.iter().filter_map(|r| r.category.as_deref()).collect();
        assert_eq!(categories, vec!["Rent", "Groceries", "Dining"]);

        let rent = &recs[0];
        assert_eq!(rent.rec_type, SUGGESTED_LIMIT);
        assert_eq!(rent.current_monthly_avg, Some(1000.0));
        assert_eq!(rent.suggested_cap, Some(900.0));
        assert_eq!(rent.priority, 10);
        assert_eq!(rent.icon.as_deref(), Some("target"));
        assert_eq!(rent.title, "Consider setting a limit for Rent");
    }

    #[test]
    fn test_regeneration_replaces_month() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, "regen@example.com");
        seed_transaction(&db, user, ymd(2024, 2, 5), "Grocer", Some("Groceries"), -300.0);
        let month: YearMonth = "2024-04".parse().unwrap();

        generate(&db, user, month).unwrap();
        generate(&db, user, month).unwrap();
        assert_eq!(db.list_recommendations(user, month).unwrap().len(), 1);
    }
}
