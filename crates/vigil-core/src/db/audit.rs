//! Alert audit trail operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{AlertAuditEntry, AuditAction};

impl Database {
    /// Append an audit entry for an alert
    pub fn record_alert_audit(
        &self,
        alert_id: i64,
        user_id: i64,
        action: AuditAction,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO alert_audit (alert_id, user_id, action) VALUES (?, ?, ?)",
            params![alert_id, user_id, action.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Audit trail of one alert, oldest first
    pub fn list_alert_audit(&self, alert_id: i64) -> Result<Vec<AlertAuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, alert_id, user_id, action, at FROM alert_audit WHERE alert_id = ? ORDER BY id ASC",
        )?;

        let entries = stmt
            .query_map(params![alert_id], |row| {
                let action: String = row.get(3)?;
                let at: String = row.get(4)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    action,
                    at,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        entries
            .into_iter()
            .map(|(id, alert_id, user_id, action, at)| {
                Ok(AlertAuditEntry {
                    id,
                    alert_id,
                    user_id,
                    action: action.parse()?,
                    at: parse_datetime(&at),
                })
            })
            .collect()
    }
}
