use std::collections::{BTreeSet, HashSet};

use super::*;

const DOCUMENT_COLUMNS: &str =
    "id, governing_body_id, title, status, metadata, extracted_text, created_at, updated_at";

impl RecordsDb {
    // =========================================================================
    // Governing bodies
    // =========================================================================

    /// Return the governing body with this name in `town_id`, creating it if needed.
    pub fn ensure_governing_body(
        &self,
        town_id: Option<i64>,
        name: &str,
    ) -> Result<DbGoverningBody, DbError> {
        let normalized = crate::normalize::normalize_name(name, false);
        // `IS` so that bodies without a town still match each other.
        let existing = self
            .conn
            .query_row(
                "SELECT id, town_id, name, normalized_name, created_at, updated_at
                 FROM governing_bodies WHERE town_id IS ?1 AND normalized_name = ?2",
                params![town_id, normalized],
                Self::map_governing_body_row,
            )
            .optional()?;
        if let Some(body) = existing {
            return Ok(body);
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO governing_bodies (town_id, name, normalized_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![town_id, name.trim(), normalized, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_governing_body(id)?
            .ok_or_else(|| DbError::NotFound(format!("Governing body {id}")))
    }

    pub fn get_governing_body(&self, id: i64) -> Result<Option<DbGoverningBody>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, town_id, name, normalized_name, created_at, updated_at
                 FROM governing_bodies WHERE id = ?1",
                params![id],
                Self::map_governing_body_row,
            )
            .optional()?)
    }

    pub fn get_governing_bodies(&self) -> Result<Vec<DbGoverningBody>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, town_id, name, normalized_name, created_at, updated_at
             FROM governing_bodies ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_governing_body_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Rename a governing body. Attendees store the body by name, so those
    /// belonging to the body's town move to the new name in the same
    /// transaction. Returns the people whose attendees changed.
    pub fn rename_governing_body(&self, id: i64, name: &str) -> Result<Vec<i64>, DbError> {
        self.with_transaction(|tx| {
            let body = tx
                .get_governing_body(id)?
                .ok_or_else(|| DbError::NotFound(format!("Governing body {id}")))?;
            let now = Utc::now().to_rfc3339();
            let renamed = tx.conn.execute(
                "UPDATE governing_bodies SET name = ?1, normalized_name = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![
                    name.trim(),
                    crate::normalize::normalize_name(name, false),
                    now,
                    id
                ],
            );
            match renamed.map_err(DbError::from) {
                Ok(_) => {}
                Err(e) if e.is_constraint_violation() => {
                    return Err(DbError::Refused(format!(
                        "A governing body named '{}' already exists in this town",
                        name.trim()
                    )));
                }
                Err(e) => return Err(e),
            }

            match body.town_id {
                Some(town_id) => tx.rename_attendee_body(town_id, &body.name, name),
                None => Ok(Vec::new()),
            }
        })
    }

    fn map_governing_body_row(row: &rusqlite::Row) -> rusqlite::Result<DbGoverningBody> {
        Ok(DbGoverningBody {
            id: row.get(0)?,
            town_id: row.get(1)?,
            name: row.get(2)?,
            normalized_name: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Insert a document in the `pending` state. Returns its id.
    pub fn insert_document(
        &self,
        governing_body_id: Option<i64>,
        title: &str,
        metadata: Option<&str>,
        extracted_text: Option<&str>,
    ) -> Result<i64, DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO documents (governing_body_id, title, status, metadata, extracted_text, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?5)",
            params![governing_body_id, title.trim(), metadata, extracted_text, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_document(&self, id: i64) -> Result<Option<DbDocument>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
                Self::map_document_row,
            )
            .optional()?)
    }

    pub fn get_documents(&self) -> Result<Vec<DbDocument>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id"))?;
        let rows = stmt.query_map([], Self::map_document_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_documents_for_governing_body(
        &self,
        governing_body_id: i64,
    ) -> Result<Vec<DbDocument>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE governing_body_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![governing_body_id], Self::map_document_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_document_status(&self, id: i64, status: DocumentStatus) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("Document {id}")));
        }
        Ok(())
    }

    pub fn update_document_metadata(&self, id: i64, metadata: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE documents SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            params![metadata, now, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("Document {id}")));
        }
        Ok(())
    }

    /// Delete a document. Its join rows cascade away, so every attendee and
    /// person it touched has its counter recomputed in the same transaction.
    /// Returns the ids of the affected people.
    pub fn delete_document(&self, id: i64) -> Result<Vec<i64>, DbError> {
        self.with_transaction(|tx| {
            let linked: Vec<(i64, i64)> = {
                let mut stmt = tx.conn.prepare(
                    "SELECT a.id, a.person_id FROM document_attendees da
                     JOIN attendees a ON a.id = da.attendee_id
                     WHERE da.document_id = ?1",
                )?;
                let rows = stmt.query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let deleted = tx
                .conn
                .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(DbError::NotFound(format!("Document {id}")));
            }

            let mut people = BTreeSet::new();
            for (attendee_id, person_id) in linked {
                tx.recompute_attendee_chain(attendee_id)?;
                people.insert(person_id);
            }
            for person_id in &people {
                tx.recompute_person_appearances(*person_id)?;
            }
            Ok(people.into_iter().collect())
        })
    }

    /// Recompute an attendee and every attendee its merge chain leads to.
    fn recompute_attendee_chain(&self, attendee_id: i64) -> Result<(), DbError> {
        let mut visited = HashSet::new();
        let mut next = Some(attendee_id);
        while let Some(id) = next {
            if !visited.insert(id) {
                break;
            }
            self.recompute_attendee_appearances(id)?;
            next = self.get_attendee(id)?.and_then(|a| a.state.merged_into());
        }
        Ok(())
    }

    fn map_document_row(row: &rusqlite::Row) -> rusqlite::Result<DbDocument> {
        Ok(DbDocument {
            id: row.get(0)?,
            governing_body_id: row.get(1)?,
            title: row.get(2)?,
            status: DocumentStatus::from_str_lossy(&row.get::<_, String>(3)?),
            metadata: row.get(4)?,
            extracted_text: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    #[test]
    fn test_rename_governing_body_moves_attendees_in_its_town_only() {
        let db = test_db();
        let (ashby, selectmen) = seed_town_with_body(&db, "Ashby", "Selectmen");
        let (groton, _) = seed_town_with_body(&db, "Groton", "Selectmen");
        let jane = seed_person(&db, ashby, "Jane Doe");
        let bob = seed_person(&db, groton, "Bob Roe");
        let a = seed_attendee(&db, jane, "Jane Doe", "Selectmen", &[]);
        db.record_attendee_sighting(a, "2024-01-01T00:00:00Z", "Planning Board")
            .unwrap();
        let b = seed_attendee(&db, bob, "Bob Roe", "Selectmen", &[]);

        let touched = db.rename_governing_body(selectmen, "Select Board").unwrap();
        assert_eq!(touched, vec![jane]);

        let moved = db.get_attendee(a).unwrap().unwrap();
        assert_eq!(moved.governing_body, "Select Board");
        assert_eq!(
            moved.governing_bodies,
            vec!["Select Board".to_string(), "Planning Board".to_string()]
        );
        let other_town = db.get_attendee(b).unwrap().unwrap();
        assert_eq!(other_town.governing_body, "Selectmen");
        assert_eq!(other_town.governing_bodies, vec!["Selectmen".to_string()]);
    }

    #[test]
    fn test_rename_governing_body_refuses_identity_collision() {
        let db = test_db();
        let (ashby, selectmen) = seed_town_with_body(&db, "Ashby", "Selectmen");
        let jane = seed_person(&db, ashby, "Jane Doe");
        let old = seed_attendee(&db, jane, "Jane Doe", "Selectmen", &[]);
        seed_attendee(&db, jane, "Jane Doe", "Select Board", &[]);

        let err = db.rename_governing_body(selectmen, "Select Board").unwrap_err();
        assert!(matches!(err, DbError::Refused(_)));
        // rolled back: neither the body nor the attendee moved
        assert_eq!(db.get_governing_body(selectmen).unwrap().unwrap().name, "Selectmen");
        assert_eq!(db.get_attendee(old).unwrap().unwrap().governing_body, "Selectmen");
    }

    #[test]
    fn test_ensure_governing_body_dedupes_without_town() {
        let db = test_db();
        let a = db.ensure_governing_body(None, "Board of Health").unwrap();
        let b = db.ensure_governing_body(None, "board  of health").unwrap();
        assert_eq!(a.id, b.id);

        let town = db.ensure_town("Ashby").unwrap();
        let c = db.ensure_governing_body(Some(town.id), "Board of Health").unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_metadata_field_decodes_json() {
        let db = test_db();
        let (_, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let id = seed_document(
            &db,
            Some(body),
            "Minutes",
            DocumentStatus::Complete,
            Some(r#"{"attendees":[{"name":"Jane Doe"}],"meeting_date":"2024-01-15","topics":null}"#),
        );
        let doc = db.get_document(id).unwrap().unwrap();
        assert!(doc.is_complete());
        assert_eq!(
            doc.metadata_field("meeting_date").and_then(|v| v.as_str().map(String::from)),
            Some("2024-01-15".to_string())
        );
        assert_eq!(doc.metadata_field("attendees").unwrap().as_array().unwrap().len(), 1);
        assert!(doc.metadata_field("topics").is_none());
        assert!(doc.metadata_field("missing").is_none());
    }

    #[test]
    fn test_delete_document_recomputes_counters() {
        let db = test_db();
        let (town, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let d1 = seed_document(&db, Some(body), "Jan", DocumentStatus::Complete, None);
        let d2 = seed_document(&db, Some(body), "Feb", DocumentStatus::Complete, None);
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "Jane Doe", "Select Board", &[d1, d2]);

        let affected = db.delete_document(d1).expect("delete");
        assert_eq!(affected, vec![p]);
        assert!(db.get_document(d1).unwrap().is_none());
        assert_eq!(db.get_person(p).unwrap().unwrap().appearances_count, 1);
        assert_eq!(db.get_attendee(a).unwrap().unwrap().appearances_count, 1);
        assert!(db.get_document_attendees(d1).unwrap().is_empty());

        assert!(matches!(db.delete_document(d1), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_delete_document_updates_merge_target() {
        let db = test_db();
        let (town, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let d1 = seed_document(&db, Some(body), "Jan", DocumentStatus::Complete, None);
        let p = seed_person(&db, town, "Jane Doe");
        let source = seed_attendee(&db, p, "Jane Do", "Select Board", &[d1]);
        let target = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);
        db.merge_attendees(source, target).unwrap();
        assert_eq!(db.get_attendee(target).unwrap().unwrap().appearances_count, 1);

        db.delete_document(d1).unwrap();
        assert_eq!(db.get_attendee(target).unwrap().unwrap().appearances_count, 0);
    }
}
