//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Map the --user email to a user id
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use vigil_core::db::Database;
use vigil_core::models::YearMonth;
use vigil_core::AlertService;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Get or create the user the command acts for
pub fn resolve_user(db: &Database, email: &str) -> Result<i64> {
    let email = email.trim();
    if email.is_empty() {
        anyhow::bail!("--user must not be blank");
    }
    let user = db
        .get_or_create_user(email)
        .with_context(|| format!("Failed to resolve user {}", email))?;
    Ok(user.id)
}

/// Open the database and resolve --user in one step
pub fn open_for_user(db_path: &Path, email: &str, no_encrypt: bool) -> Result<(AlertService, i64)> {
    let db = open_db(db_path, no_encrypt)?;
    let user_id = resolve_user(&db, email)?;
    Ok((AlertService::new(db), user_id))
}

/// Parse an optional `YYYY-MM`, defaulting to the current month
pub fn parse_month(month: Option<&str>) -> Result<YearMonth> {
    match month {
        Some(m) => Ok(m.parse()?),
        None => Ok(YearMonth::current()),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: vigil import --file history.csv");
    println!("  2. Review alerts: vigil alerts");
    println!("  3. Start the API: vigil serve");

    Ok(())
}
