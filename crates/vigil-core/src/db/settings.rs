//! Alert settings operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{format_datetime, parse_datetime, parse_optional_datetime, Database};
use crate::error::Result;
use crate::models::{AlertSettings, AlertThresholds};

const SETTINGS_COLUMNS: &str = r#"
    user_id, large_multiplier, large_min_amount, freq_window_hours, freq_max_txn,
    freq_min_amount, cat_spike_multiplier, cat_spike_lookback_months, cat_spike_min_amount,
    new_merchant_min_amount, critical_large_absolute, critical_category_spike_multiplier,
    critical_frequency_count, critical_new_merchant_absolute, last_generated_at,
    last_generated_count, created_at, updated_at
"#;

impl Database {
    /// Get a user's settings without creating them
    pub fn get_alert_settings(&self, user_id: i64) -> Result<Option<AlertSettings>> {
        let conn = self.conn()?;
        let settings = conn
            .query_row(
                &format!(
                    "SELECT {} FROM alert_settings WHERE user_id = ?",
                    SETTINGS_COLUMNS
                ),
                params![user_id],
                Self::row_to_settings,
            )
            .optional()?;
        Ok(settings)
    }

    /// Get a user's settings, creating the default row on first use
    ///
    /// A concurrent creator may win the insert; the unique constraint then
    /// rejects ours and the winner's row is read back.
    pub fn get_or_create_alert_settings(&self, user_id: i64) -> Result<AlertSettings> {
        if let Some(settings) = self.get_alert_settings(user_id)? {
            return Ok(settings);
        }

        match self.insert_default_settings(user_id) {
            Ok(()) => {}
            Err(e) if e.is_constraint_violation() => {
                debug!(user_id, "Settings created concurrently, re-reading");
            }
            Err(e) => return Err(e),
        }

        self.get_alert_settings(user_id)?.ok_or_else(|| {
            crate::Error::NotFound(format!("Alert settings for user {}", user_id))
        })
    }

    fn insert_default_settings(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let d = AlertThresholds::default();
        conn.execute(
            r#"
            INSERT INTO alert_settings (user_id, large_multiplier, large_min_amount, freq_window_hours,
                freq_max_txn, freq_min_amount, cat_spike_multiplier, cat_spike_lookback_months,
                cat_spike_min_amount, new_merchant_min_amount)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                d.large_multiplier,
                d.large_min_amount,
                d.freq_window_hours,
                d.freq_max_txn,
                d.freq_min_amount,
                d.cat_spike_multiplier,
                d.cat_spike_lookback_months,
                d.cat_spike_min_amount,
                d.new_merchant_min_amount,
            ],
        )?;
        Ok(())
    }

    /// Replace a user's tunables (caller validates)
    pub fn update_alert_thresholds(
        &self,
        user_id: i64,
        t: &AlertThresholds,
    ) -> Result<AlertSettings> {
        self.get_or_create_alert_settings(user_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE alert_settings SET
                large_multiplier = ?, large_min_amount = ?, freq_window_hours = ?, freq_max_txn = ?,
                freq_min_amount = ?, cat_spike_multiplier = ?, cat_spike_lookback_months = ?,
                cat_spike_min_amount = ?, new_merchant_min_amount = ?, critical_large_absolute = ?,
                critical_category_spike_multiplier = ?, critical_frequency_count = ?,
                critical_new_merchant_absolute = ?, updated_at = ?
            WHERE user_id = ?
            "#,
            params![
                t.large_multiplier,
                t.large_min_amount,
                t.freq_window_hours,
                t.freq_max_txn,
                t.freq_min_amount,
                t.cat_spike_multiplier,
                t.cat_spike_lookback_months,
                t.cat_spike_min_amount,
                t.new_merchant_min_amount,
                t.critical_large_absolute,
                t.critical_category_spike_multiplier,
                t.critical_frequency_count,
                t.critical_new_merchant_absolute,
                format_datetime(&Utc::now()),
                user_id,
            ],
        )?;
        drop(conn);

        self.get_or_create_alert_settings(user_id)
    }

    /// Record the outcome of the latest recompute pass
    pub fn record_generation(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        generated: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let at = format_datetime(&at);
        conn.execute(
            "UPDATE alert_settings SET last_generated_at = ?, last_generated_count = ?, updated_at = ? WHERE user_id = ?",
            params![at, generated, at, user_id],
        )?;
        Ok(())
    }

    fn row_to_settings(row: &rusqlite::Row) -> rusqlite::Result<AlertSettings> {
        let created_at: String = row.get(16)?;
        let updated_at: String = row.get(17)?;
        Ok(AlertSettings {
            user_id: row.get(0)?,
            thresholds: AlertThresholds {
                large_multiplier: row.get(1)?,
                large_min_amount: row.get(2)?,
                freq_window_hours: row.get(3)?,
                freq_max_txn: row.get(4)?,
                freq_min_amount: row.get(5)?,
                cat_spike_multiplier: row.get(6)?,
                cat_spike_lookback_months: row.get(7)?,
                cat_spike_min_amount: row.get(8)?,
                new_merchant_min_amount: row.get(9)?,
                critical_large_absolute: row.get(10)?,
                critical_category_spike_multiplier: row.get(11)?,
                critical_frequency_count: row.get(12)?,
                critical_new_merchant_absolute: row.get(13)?,
            },
            last_generated_at: parse_optional_datetime(row.get(14)?),
            last_generated_count: row.get(15)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
