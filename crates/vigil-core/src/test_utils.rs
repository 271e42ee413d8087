//! Test utilities for vigil-core
//!
//! Seeding helpers shared by unit tests, integration tests and the server
//! crate (via the `test-utils` feature). They panic on failure.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::db::{Database, TransactionInsertResult};
use crate::models::NewTransaction;

/// Create (or fetch) a user and return its id
pub fn seed_user(db: &Database, email: &str) -> i64 {
    db.get_or_create_user(email).expect("seed user").id
}

/// Insert one transaction and return its id
///
/// `merchant` doubles as the description. Every call gets a unique import
/// hash, so identical rows are all inserted.
pub fn seed_transaction(
    db: &Database,
    user_id: i64,
    date: NaiveDate,
    merchant: &str,
    category: Option<&str>,
    amount: f64,
) -> i64 {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::SeqCst);

    let tx = NewTransaction {
        date,
        description: merchant.to_string(),
        merchant: if merchant.trim().is_empty() {
            None
        } else {
            Some(merchant.to_string())
        },
        category: category.map(str::to_string),
        amount,
        import_hash: format!("seed-{}-{}-{}", std::process::id(), user_id, seq),
    };

    match db.insert_transaction(user_id, &tx).expect("seed transaction") {
        TransactionInsertResult::Inserted(id) => id,
        TransactionInsertResult::Duplicate(id) => id,
    }
}

/// Shorthand for `NaiveDate::from_ymd_opt(..).unwrap()`
pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
