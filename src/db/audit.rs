use super::*;
use crate::audit::AuditCategory;

impl RecordsDb {
    // =========================================================================
    // Audit log
    // =========================================================================

    pub fn insert_audit_log(
        &self,
        action: &str,
        actor: Option<&str>,
        ip_address: Option<&str>,
        details: &serde_json::Value,
    ) -> Result<i64, DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO audit_logs (action, actor, ip_address, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![action, actor, ip_address, details.to_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent audit rows first.
    pub fn get_audit_logs(&self, limit: usize) -> Result<Vec<DbAuditLog>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action, actor, ip_address, details, created_at
             FROM audit_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let details: String = row.get(4)?;
            Ok(DbAuditLog {
                id: row.get(0)?,
                action: row.get(1)?,
                actor: row.get(2)?,
                ip_address: row.get(3)?,
                details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Row counts per audit category, in one grouped pass.
    ///
    /// The CASE arms mirror `AuditCategory::classify`; categories with no
    /// rows are absent from the result.
    pub fn audit_counts_by_category(&self) -> Result<Vec<(AuditCategory, i64)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE
                        WHEN action LIKE 'person_merge%' THEN 'person_merge'
                        WHEN action LIKE 'attendee_merge%' THEN 'attendee_merge'
                        WHEN action LIKE 'attendee_unmerge%' THEN 'unmerge'
                        WHEN action LIKE 'duplicate_detection%' THEN 'detection'
                        ELSE 'other'
                    END AS category,
                    COUNT(*)
             FROM audit_logs
             GROUP BY category
             ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| {
            let category: String = row.get(0)?;
            Ok((AuditCategory::from_str_lossy(&category), row.get(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_insert_and_read_back() {
        let db = test_db();
        db.insert_audit_log(
            "person_merge",
            Some("clerk@ashby.gov"),
            Some("10.0.0.5"),
            &serde_json::json!({"sourceId": 3, "targetId": 1}),
        )
        .unwrap();

        let logs = db.get_audit_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "person_merge");
        assert_eq!(logs[0].actor.as_deref(), Some("clerk@ashby.gov"));
        assert_eq!(logs[0].details["targetId"], 1);
    }

    #[test]
    fn test_counts_by_category_single_query_matches_classify() {
        let db = test_db();
        let actions = [
            "person_merge",
            "person_merge",
            "attendee_merge",
            "attendee_unmerge",
            "duplicate_detection",
            "search_rebuild",
        ];
        for action in actions {
            db.insert_audit_log(action, None, None, &serde_json::json!({})).unwrap();
        }

        let counts = db.audit_counts_by_category().unwrap();
        let get = |c: AuditCategory| {
            counts
                .iter()
                .find(|(cat, _)| *cat == c)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        assert_eq!(get(AuditCategory::PersonMerge), 2);
        assert_eq!(get(AuditCategory::AttendeeMerge), 1);
        assert_eq!(get(AuditCategory::Unmerge), 1);
        assert_eq!(get(AuditCategory::Detection), 1);
        assert_eq!(get(AuditCategory::Other), 1);

        for action in actions {
            let in_app = AuditCategory::classify(action);
            assert!(get(in_app) > 0, "{action} classified as {in_app:?}");
        }
    }
}
