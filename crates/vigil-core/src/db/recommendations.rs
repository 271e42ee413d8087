//! Recommendation operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewRecommendation, Recommendation, YearMonth};

impl Database {
    /// Replace all of a user's recommendations for a month
    pub fn replace_recommendations(
        &self,
        user_id: i64,
        month: YearMonth,
        recs: &[NewRecommendation],
    ) -> Result<Vec<Recommendation>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let month_str = month.to_string();

        tx.execute(
            "DELETE FROM alert_recommendations WHERE user_id = ? AND month = ?",
            params![user_id, month_str],
        )?;

        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO alert_recommendations (user_id, month, type, priority, title, message,
                    icon, category, current_monthly_avg, suggested_cap, rationale)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for rec in recs {
                insert.execute(params![
                    user_id,
                    month_str,
                    rec.rec_type,
                    rec.priority,
                    rec.title,
                    rec.message,
                    rec.icon,
                    rec.category,
                    rec.current_monthly_avg,
                    rec.suggested_cap,
                    rec.rationale,
                ])?;
            }
        }

        tx.commit()?;
        self.list_recommendations(user_id, month)
    }

    /// List a user's recommendations for a month, highest priority first
    pub fn list_recommendations(
        &self,
        user_id: i64,
        month: YearMonth,
    ) -> Result<Vec<Recommendation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, month, type, priority, title, message, icon, category,
                   current_monthly_avg, suggested_cap, rationale, created_at
            FROM alert_recommendations
            WHERE user_id = ? AND month = ?
            ORDER BY priority DESC, id ASC
            "#,
        )?;

        let recs = stmt
            .query_map(params![user_id, month.to_string()], |row| {
                let month_str: String = row.get(2)?;
                let created_at: String = row.get(12)?;
                Ok(Recommendation {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    month: month_str.parse().unwrap_or(month),
                    rec_type: row.get(3)?,
                    priority: row.get(4)?,
                    title: row.get(5)?,
                    message: row.get(6)?,
                    icon: row.get(7)?,
                    category: row.get(8)?,
                    current_monthly_avg: row.get(9)?,
                    suggested_cap: row.get(10)?,
                    rationale: row.get(11)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(recs)
    }
}
