//! Alert store operations

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{format_datetime, parse_date, parse_datetime, parse_optional_datetime, Database};
use crate::error::Result;
use crate::models::{Alert, AlertMetadata, AlertQuery, AuditAction, NewAlert};

/// Cap on existing alerts loaded for one (user, month) during recompute
pub const MAX_PERIOD_ALERTS: i64 = 2000;

const ALERT_COLUMNS: &str = r#"
    id, user_id, type, severity, title, description, amount, merchant, category, txn_date,
    reason, txn_id, metadata, acknowledged, acknowledged_at, dismissed, dismissed_at,
    created_at, updated_at
"#;

impl Database {
    /// Existing alerts for a period, dismissed ones included
    pub fn find_period_alerts(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE user_id = ? AND txn_date >= ? AND txn_date <= ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            ALERT_COLUMNS
        ))?;

        let alerts = stmt
            .query_map(
                params![user_id, from.to_string(), to.to_string(), MAX_PERIOD_ALERTS],
                Self::row_to_alert,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if alerts.len() as i64 >= MAX_PERIOD_ALERTS {
            warn!(
                user_id,
                from = %from,
                limit = MAX_PERIOD_ALERTS,
                "Period alert lookup hit its cap; older alerts are not reconciled"
            );
        }

        Ok(alerts)
    }

    /// Atomically delete replaceable alerts and insert their replacements
    ///
    /// Returns the inserted alerts in insertion order. Either every delete and
    /// insert lands, or none do.
    ///
    /// Each inserted alert gets its "created" audit row in the same transaction.
    pub fn replace_period_alerts(
        &self,
        delete_ids: &[i64],
        inserts: &[NewAlert],
    ) -> Result<Vec<Alert>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut delete = tx.prepare("DELETE FROM alerts WHERE id = ?")?;
            for id in delete_ids {
                delete.execute(params![id])?;
            }
        }

        let now = format_datetime(&Utc::now());
        let mut inserted = Vec::with_capacity(inserts.len());
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO alerts (user_id, type, severity, title, description, amount, merchant,
                                    category, txn_date, reason, txn_id, metadata, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            let mut audit = tx.prepare(
                "INSERT INTO alert_audit (alert_id, user_id, action) VALUES (?, ?, ?)",
            )?;
            for alert in inserts {
                let metadata = serde_json::to_string(&alert.metadata)?;
                insert.execute(params![
                    alert.user_id,
                    alert.alert_type.as_str(),
                    alert.severity.as_str(),
                    alert.title,
                    alert.description,
                    alert.amount,
                    alert.merchant,
                    alert.category,
                    alert.txn_date.to_string(),
                    alert.reason,
                    alert.txn_id,
                    metadata,
                    now,
                    now,
                ])?;
                let id = tx.last_insert_rowid();
                audit.execute(params![id, alert.user_id, AuditAction::Created.as_str()])?;
                if let Some(stored) = Self::fetch_alert(&tx, id)? {
                    inserted.push(stored);
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Get an alert by ID
    pub fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        Self::fetch_alert(&conn, id)
    }

    fn fetch_alert(conn: &Connection, id: i64) -> Result<Option<Alert>> {
        let alert = conn
            .query_row(
                &format!("SELECT {} FROM alerts WHERE id = ?", ALERT_COLUMNS),
                params![id],
                Self::row_to_alert,
            )
            .optional()?;
        Ok(alert)
    }

    /// Search non-dismissed alerts of a user in [from, to]
    ///
    /// Returns the requested page and the total number of matches.
    pub fn search_alerts(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        query: &AlertQuery,
    ) -> Result<(Vec<Alert>, i64)> {
        let conn = self.conn()?;

        let mut conditions = vec![
            "user_id = ?".to_string(),
            "txn_date >= ?".to_string(),
            "txn_date <= ?".to_string(),
            "dismissed = 0".to_string(),
        ];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(user_id),
            Box::new(from.to_string()),
            Box::new(to.to_string()),
        ];

        if let Some(t) = query.alert_type {
            conditions.push("type = ?".to_string());
            params.push(Box::new(t.as_str()));
        }
        if let Some(s) = query.severity {
            conditions.push("severity = ?".to_string());
            params.push(Box::new(s.as_str()));
        }
        if let Some(ack) = query.acknowledged {
            conditions.push("acknowledged = ?".to_string());
            params.push(Box::new(ack));
        }

        let where_clause = conditions.join(" AND ");
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM alerts WHERE {}", where_clause),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        // Column and direction come from a closed enum, never from user text
        let direction = if query.sort.descending { "DESC" } else { "ASC" };
        let size = query.page_size() as i64;
        let offset = query.page as i64 * size;
        let sql = format!(
            "SELECT {} FROM alerts WHERE {} ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
            ALERT_COLUMNS,
            where_clause,
            query.sort.field.column(),
            direction,
            direction,
            size,
            offset
        );

        let mut stmt = conn.prepare(&sql)?;
        let alerts = stmt
            .query_map(params_refs.as_slice(), Self::row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((alerts, total))
    }

    /// Open alert counts for a user: (critical, moderate, acknowledged, total)
    ///
    /// "Open" means not dismissed; critical and moderate count only
    /// unacknowledged alerts.
    pub fn count_open_alerts(&self, user_id: i64) -> Result<(i64, i64, i64, i64)> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN severity = 'critical' AND acknowledged = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN severity = 'moderate' AND acknowledged = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN acknowledged = 1 THEN 1 ELSE 0 END), 0),
                COUNT(*)
            FROM alerts
            WHERE user_id = ? AND dismissed = 0
            "#,
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        Ok(counts)
    }

    /// Mark an alert acknowledged; the timestamp is only set the first time
    pub fn mark_alert_acknowledged(&self, id: i64) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        let now = format_datetime(&Utc::now());
        conn.execute(
            r#"
            UPDATE alerts
            SET acknowledged_at = CASE WHEN acknowledged = 1 THEN acknowledged_at ELSE ? END,
                acknowledged = 1,
                updated_at = ?
            WHERE id = ?
            "#,
            params![now, now, id],
        )?;
        Self::fetch_alert(&conn, id)
    }

    /// Mark an alert dismissed, refreshing the dismissal timestamp
    pub fn mark_alert_dismissed(&self, id: i64) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        let now = format_datetime(&Utc::now());
        conn.execute(
            "UPDATE alerts SET dismissed = 1, dismissed_at = ?, updated_at = ? WHERE id = ?",
            params![now, now, id],
        )?;
        Self::fetch_alert(&conn, id)
    }

    /// List every alert of a user, newest first (dismissed included)
    pub fn list_user_alerts(&self, user_id: i64) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM alerts WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            ALERT_COLUMNS
        ))?;
        let alerts = stmt
            .query_map(params![user_id], Self::row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
        let type_str: String = row.get(2)?;
        let severity_str: String = row.get(3)?;
        let txn_date: String = row.get(9)?;
        let metadata: Option<String> = row.get(12)?;
        let created_at: String = row.get(17)?;
        let updated_at: String = row.get(18)?;

        let alert_type = type_str.parse().map_err(|e: crate::Error| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let severity = severity_str.parse().map_err(|e: crate::Error| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Alert {
            id: row.get(0)?,
            user_id: row.get(1)?,
            alert_type,
            severity,
            title: row.get(4)?,
            description: row.get(5)?,
            amount: row.get(6)?,
            merchant: row.get(7)?,
            category: row.get(8)?,
            txn_date: parse_date(&txn_date),
            reason: row.get(10)?,
            txn_id: row.get(11)?,
            metadata: metadata.and_then(|m| serde_json::from_str::<AlertMetadata>(&m).ok()),
            acknowledged: row.get(13)?,
            acknowledged_at: parse_optional_datetime(row.get(14)?),
            dismissed: row.get(15)?,
            dismissed_at: parse_optional_datetime(row.get(16)?),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
