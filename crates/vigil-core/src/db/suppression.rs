//! Merchant whitelist and muted category operations
//!
//! Both tables compare names case-insensitively (`COLLATE NOCASE`), so
//! "Netflix" and "NETFLIX" are the same entry.

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{MutedCategory, WhitelistEntry};

impl Database {
    /// Whitelist a merchant (idempotent)
    pub fn add_whitelist_merchant(&self, user_id: i64, merchant: &str) -> Result<WhitelistEntry> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO alert_whitelist (user_id, merchant) VALUES (?, ?)",
            params![user_id, merchant],
        )?;
        let entry = conn.query_row(
            "SELECT id, user_id, merchant, created_at FROM alert_whitelist WHERE user_id = ? AND merchant = ?",
            params![user_id, merchant],
            Self::row_to_whitelist_entry,
        )?;
        Ok(entry)
    }

    /// List a user's whitelisted merchants
    pub fn list_whitelist(&self, user_id: i64) -> Result<Vec<WhitelistEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, merchant, created_at FROM alert_whitelist WHERE user_id = ? ORDER BY merchant",
        )?;
        let entries = stmt
            .query_map(params![user_id], Self::row_to_whitelist_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove a merchant from the whitelist; returns whether it was present
    pub fn remove_whitelist_merchant(&self, user_id: i64, merchant: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM alert_whitelist WHERE user_id = ? AND merchant = ?",
            params![user_id, merchant],
        )?;
        Ok(removed > 0)
    }

    /// Mute a category, replacing any existing mute-until date
    pub fn mute_category(
        &self,
        user_id: i64,
        category: &str,
        mute_until: Option<NaiveDate>,
    ) -> Result<MutedCategory> {
        let conn = self.conn()?;
        let until = mute_until.map(|d| d.to_string());
        conn.execute(
            r#"
            INSERT INTO alert_muted_categories (user_id, category, mute_until)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, category) DO UPDATE SET mute_until = excluded.mute_until
            "#,
            params![user_id, category, until],
        )?;
        let muted = conn.query_row(
            "SELECT id, user_id, category, mute_until, created_at FROM alert_muted_categories WHERE user_id = ? AND category = ?",
            params![user_id, category],
            Self::row_to_muted_category,
        )?;
        Ok(muted)
    }

    /// List all of a user's muted categories, expired ones included
    pub fn list_muted_categories(&self, user_id: i64) -> Result<Vec<MutedCategory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, category, mute_until, created_at FROM alert_muted_categories WHERE user_id = ? ORDER BY category",
        )?;
        let muted = stmt
            .query_map(params![user_id], Self::row_to_muted_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(muted)
    }

    /// Muted categories still in force on `today`
    pub fn active_muted_categories(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<MutedCategory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, category, mute_until, created_at
            FROM alert_muted_categories
            WHERE user_id = ? AND (mute_until IS NULL OR mute_until >= ?)
            ORDER BY category
            "#,
        )?;
        let muted = stmt
            .query_map(
                params![user_id, today.to_string()],
                Self::row_to_muted_category,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(muted)
    }

    /// Unmute a category; returns whether it was muted
    pub fn unmute_category(&self, user_id: i64, category: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM alert_muted_categories WHERE user_id = ? AND category = ?",
            params![user_id, category],
        )?;
        Ok(removed > 0)
    }

    fn row_to_whitelist_entry(row: &rusqlite::Row) -> rusqlite::Result<WhitelistEntry> {
        let created_at: String = row.get(3)?;
        Ok(WhitelistEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            merchant: row.get(2)?,
            created_at: parse_datetime(&created_at),
        })
    }

    fn row_to_muted_category(row: &rusqlite::Row) -> rusqlite::Result<MutedCategory> {
        let mute_until: Option<String> = row.get(3)?;
        let created_at: String = row.get(4)?;
        Ok(MutedCategory {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category: row.get(2)?,
            mute_until: mute_until.as_deref().map(parse_date),
            created_at: parse_datetime(&created_at),
        })
    }
}
