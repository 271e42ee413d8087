//! Trailing per-category spend baselines

use chrono::{Months, NaiveDate};
use std::collections::HashMap;
use tracing::debug;

use crate::db::Database;
use crate::error::Result;

/// Average absolute monthly outflow per category, keyed by category name
///
/// Uncategorized spend is keyed by the empty string. A category with no
/// history in the window is simply absent, which rules read as 0.
pub type Baselines = HashMap<String, f64>;

/// Round to whole cents
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The `lookback_months` whole months preceding `from`: `[from - N months, from - 1 day]`
pub fn baseline_window(from: NaiveDate, lookback_months: u32) -> (NaiveDate, NaiveDate) {
    let start = from
        .checked_sub_months(Months::new(lookback_months))
        .unwrap_or(NaiveDate::MIN);
    let end = from.pred_opt().unwrap_or(from);
    (start, end)
}

/// Compute per-category baselines for a period starting at `from`
pub fn compute_baselines(
    db: &Database,
    user_id: i64,
    from: NaiveDate,
    lookback_months: u32,
) -> Result<Baselines> {
    let months = lookback_months.max(1);
    let (start, end) = baseline_window(from, months);
    let aggregates = db.aggregate_category_outflows(user_id, start, end)?;

    let baselines: Baselines = aggregates
        .into_iter()
        .map(|agg| {
            let avg = round_cents(agg.total_amount.abs() / months as f64);
            (agg.category.unwrap_or_default(), avg)
        })
        .collect();

    debug!(
        user_id,
        window_start = %start,
        window_end = %end,
        categories = baselines.len(),
        "Computed baselines"
    );
    Ok(baselines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_transaction, seed_user};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_is_whole_preceding_months() {
        let (start, end) = baseline_window(date(2024, 4, 1), 3);
        assert_eq!(start, date(2024, 1, 1));
        assert_eq!(end, date(2024, 3, 31));
    }

    #[test]
    fn test_average_over_lookback() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, "baseline@example.com");

        seed_transaction(&db, user, date(2024, 1, 10), "Grocer", Some("Groceries"), -100.0);
        seed_transaction(&db, user, date(2024, 2, 10), "Grocer", Some("Groceries"), -200.0);
        seed_transaction(&db, user, date(2024, 3, 10), "Grocer", Some("Groceries"), -100.01);
        // Inflows and in-period spend are ignored
        seed_transaction(&db, user, date(2024, 3, 15), "Employer", Some("Groceries"), 500.0);
        seed_transaction(&db, user, date(2024, 4, 2), "Grocer", Some("Groceries"), -999.0);
        seed_transaction(&db, user, date(2024, 2, 1), "Misc", None, -30.0);

        let baselines = compute_baselines(&db, user, date(2024, 4, 1), 3).unwrap();
        assert_eq!(baselines.get("Groceries"), Some(&133.34));
        assert_eq!(baselines.get(""), Some(&10.0));
    }

    #[test]
    fn test_no_history_is_absent() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, "empty@example.com");
        let baselines = compute_baselines(&db, user, date(2024, 4, 1), 3).unwrap();
        assert!(baselines.is_empty());
    }
}
