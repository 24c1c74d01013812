use super::*;

const PERSON_COLUMNS: &str =
    "id, town_id, name, normalized_name, appearances_count, created_at, updated_at";

impl RecordsDb {
    // =========================================================================
    // People
    // =========================================================================

    /// Insert a new person. The normalized name is always derived from `name`
    /// with honorifics stripped.
    pub fn insert_person(&self, town_id: i64, name: &str) -> Result<DbPerson, DbError> {
        let now = Utc::now().to_rfc3339();
        let normalized = crate::normalize::normalize_name(name, true);
        self.conn.execute(
            "INSERT INTO people (town_id, name, normalized_name, appearances_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![town_id, name.trim(), normalized, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_person(id)?
            .ok_or_else(|| DbError::NotFound(format!("Person {id}")))
    }

    pub fn get_person(&self, id: i64) -> Result<Option<DbPerson>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1"),
                params![id],
                Self::map_person_row,
            )
            .optional()?)
    }

    /// All people ordered by primary key.
    pub fn get_people(&self) -> Result<Vec<DbPerson>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PERSON_COLUMNS} FROM people ORDER BY id"))?;
        let rows = stmt.query_map([], Self::map_person_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Look up the oldest person in a town with the given normalized name.
    pub fn find_person_by_normalized_name(
        &self,
        town_id: i64,
        normalized_name: &str,
    ) -> Result<Option<DbPerson>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {PERSON_COLUMNS} FROM people
                     WHERE town_id = ?1 AND normalized_name = ?2
                     ORDER BY id LIMIT 1"
                ),
                params![town_id, normalized_name],
                Self::map_person_row,
            )
            .optional()?)
    }

    /// Rename a person, re-deriving the normalized name.
    pub fn rename_person(&self, id: i64, name: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE people SET name = ?1, normalized_name = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                name.trim(),
                crate::normalize::normalize_name(name, true),
                now,
                id
            ],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("Person {id}")));
        }
        Ok(())
    }

    /// Authoritative appearance count: join rows reached through the person's attendees.
    pub fn count_person_appearances(&self, person_id: i64) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM document_attendees da
             JOIN attendees a ON a.id = da.attendee_id
             WHERE a.person_id = ?1",
            params![person_id],
            |row| row.get(0),
        )?)
    }

    /// Recompute a person's appearance counter from the join table.
    /// Returns the new count.
    pub fn recompute_person_appearances(&self, person_id: i64) -> Result<i64, DbError> {
        let count = self.count_person_appearances(person_id)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE people SET appearances_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![count, now, person_id],
        )?;
        Ok(count)
    }

    /// Number of attendees (merged or not) owned by a person.
    pub fn count_person_attendees(&self, person_id: i64) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM attendees WHERE person_id = ?1",
            params![person_id],
            |row| row.get(0),
        )?)
    }

    /// Load several people at once, ordered by id. Missing ids are skipped.
    pub fn get_people_by_ids(&self, ids: &[i64]) -> Result<Vec<DbPerson>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE id IN ({placeholders}) ORDER BY id"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), Self::map_person_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a person that no longer owns any attendee.
    ///
    /// Refuses while attendees still point at the person; the FK is
    /// `ON DELETE RESTRICT` as well, this check just gives a readable error.
    pub fn delete_person(&self, person_id: i64) -> Result<(), DbError> {
        let attendees = self.count_person_attendees(person_id)?;
        if attendees > 0 {
            return Err(DbError::Refused(format!(
                "Person {person_id} still has {attendees} attendee(s)"
            )));
        }
        self.with_transaction(|tx| {
            tx.delete_suggestions_for_person(person_id)?;
            let deleted = tx
                .conn
                .execute("DELETE FROM people WHERE id = ?1", params![person_id])?;
            if deleted == 0 {
                return Err(DbError::NotFound(format!("Person {person_id}")));
            }
            Ok(())
        })
    }

    /// Delete a person only if nothing references it. Runs inside the
    /// caller's transaction. Returns whether a row was removed.
    pub(crate) fn delete_unreferenced_person(&self, person_id: i64) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM people WHERE id = ?1
               AND NOT EXISTS (SELECT 1 FROM attendees WHERE person_id = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM duplicate_suggestions
                   WHERE person_id = ?1 OR duplicate_person_id = ?1
               )",
            params![person_id],
        )?;
        Ok(deleted > 0)
    }

    /// Merge `source_id` into `target_id`: re-point every attendee of the source
    /// at the target, recompute the target's counter from join rows, then hard
    /// delete the source.
    ///
    /// Duplicate suggestions referencing the source must be removed first
    /// (see `delete_suggestions_for_person`); otherwise the final delete fails
    /// on the foreign key and the whole merge rolls back.
    pub fn merge_people(&self, source_id: i64, target_id: i64) -> Result<PersonMergeResult, DbError> {
        self.with_transaction(|tx| {
            let source = tx
                .get_person(source_id)?
                .ok_or_else(|| DbError::NotFound(format!("Person {source_id}")))?;
            let target = tx
                .get_person(target_id)?
                .ok_or_else(|| DbError::NotFound(format!("Person {target_id}")))?;

            let now = Utc::now().to_rfc3339();
            let attendees_moved = tx.conn.execute(
                "UPDATE attendees SET person_id = ?1, updated_at = ?3 WHERE person_id = ?2",
                params![target_id, source_id, now],
            )?;

            let target_appearances_after = tx.recompute_person_appearances(target_id)?;

            tx.conn
                .execute("DELETE FROM people WHERE id = ?1", params![source_id])?;

            Ok(PersonMergeResult {
                attendees_moved,
                source_appearances: source.appearances_count,
                target_appearances_before: target.appearances_count,
                target_appearances_after,
            })
        })
    }

    /// Recompute every person and attendee counter from join rows.
    /// Returns how many counters changed.
    pub fn recompute_all_appearance_counts(&self) -> Result<usize, DbError> {
        self.with_transaction(|tx| {
            let now = Utc::now().to_rfc3339();
            let people = tx.conn.execute(
                "UPDATE people SET appearances_count = (
                    SELECT COUNT(*) FROM document_attendees da
                    JOIN attendees a ON a.id = da.attendee_id
                    WHERE a.person_id = people.id
                 ), updated_at = ?1
                 WHERE appearances_count <> (
                    SELECT COUNT(*) FROM document_attendees da
                    JOIN attendees a ON a.id = da.attendee_id
                    WHERE a.person_id = people.id
                 )",
                params![now],
            )?;
            let ids: Vec<i64> = {
                let mut stmt = tx.conn.prepare("SELECT id FROM attendees ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            let mut attendees = 0;
            for id in ids {
                let before: i64 = tx.conn.query_row(
                    "SELECT appearances_count FROM attendees WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                if tx.recompute_attendee_appearances(id)? != before {
                    attendees += 1;
                }
            }
            Ok(people + attendees)
        })
    }

    pub(crate) fn map_person_row(row: &rusqlite::Row) -> rusqlite::Result<DbPerson> {
        Ok(DbPerson {
            id: row.get(0)?,
            town_id: row.get(1)?,
            name: row.get(2)?,
            normalized_name: row.get(3)?,
            appearances_count: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
