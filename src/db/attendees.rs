use std::collections::{BTreeSet, HashSet};

use super::*;

const ATTENDEE_COLUMNS: &str = "id, person_id, name, normalized_name, governing_body, \
     governing_bodies, first_seen_at, last_seen_at, merged_into_id, appearances_count, \
     created_at, updated_at";

impl RecordsDb {
    // =========================================================================
    // Attendees
    // =========================================================================

    /// Insert a new active attendee owned by `person_id`.
    ///
    /// Fails with a constraint violation if an active attendee with the same
    /// (normalized name, governing body) already exists.
    pub fn insert_attendee(
        &self,
        person_id: i64,
        name: &str,
        governing_body: &str,
        seen_at: Option<&str>,
    ) -> Result<DbAttendee, DbError> {
        let now = Utc::now().to_rfc3339();
        let normalized = crate::normalize::normalize_name(name, true);
        let bodies = serde_json::to_string(&[governing_body.trim()])?;
        self.conn.execute(
            "INSERT INTO attendees (
                person_id, name, normalized_name, governing_body, governing_bodies,
                first_seen_at, last_seen_at, merged_into_id, appearances_count,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, NULL, 0, ?7, ?7)",
            params![
                person_id,
                name.trim(),
                normalized,
                governing_body.trim(),
                bodies,
                seen_at,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_attendee(id)?
            .ok_or_else(|| DbError::NotFound(format!("Attendee {id}")))
    }

    /// Insert an attendee, or return the active one that won a concurrent
    /// insert for the same identity key. The bool is true when this call
    /// created the row.
    pub fn insert_attendee_or_fetch_existing(
        &self,
        person_id: i64,
        name: &str,
        governing_body: &str,
        seen_at: Option<&str>,
    ) -> Result<(DbAttendee, bool), DbError> {
        match self.insert_attendee(person_id, name, governing_body, seen_at) {
            Ok(attendee) => Ok((attendee, true)),
            Err(e) if e.is_constraint_violation() => {
                let normalized = crate::normalize::normalize_name(name, true);
                match self.find_active_attendee(&normalized, governing_body.trim())? {
                    Some(existing) => {
                        log::debug!(
                            "Attendee '{}' in '{}' already created concurrently (id {})",
                            normalized,
                            governing_body,
                            existing.id
                        );
                        Ok((existing, false))
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_attendee(&self, id: i64) -> Result<Option<DbAttendee>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE id = ?1"),
                params![id],
                Self::map_attendee_row,
            )
            .optional()?)
    }

    /// Active (non-merged) attendees ordered by primary key.
    pub fn get_active_attendees(&self) -> Result<Vec<DbAttendee>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE merged_into_id IS NULL ORDER BY id"
        ))?;
        let rows = stmt.query_map([], Self::map_attendee_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_attendees_for_person(&self, person_id: i64) -> Result<Vec<DbAttendee>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE person_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![person_id], Self::map_attendee_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The active attendee holding an identity key, if any.
    pub fn find_active_attendee(
        &self,
        normalized_name: &str,
        governing_body: &str,
    ) -> Result<Option<DbAttendee>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {ATTENDEE_COLUMNS} FROM attendees
                     WHERE normalized_name = ?1 AND governing_body = ?2
                       AND merged_into_id IS NULL"
                ),
                params![normalized_name, governing_body],
                Self::map_attendee_row,
            )
            .optional()?)
    }

    /// The oldest merged-away attendee with an identity key, if any.
    pub fn find_merged_attendee(
        &self,
        normalized_name: &str,
        governing_body: &str,
    ) -> Result<Option<DbAttendee>, DbError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {ATTENDEE_COLUMNS} FROM attendees
                     WHERE normalized_name = ?1 AND governing_body = ?2
                       AND merged_into_id IS NOT NULL
                     ORDER BY id LIMIT 1"
                ),
                params![normalized_name, governing_body],
                Self::map_attendee_row,
            )
            .optional()?)
    }

    /// Follow `merged_into` links from `id` to the terminal attendee.
    ///
    /// The walk keeps a visited set: on a cyclic chain it stops at the last
    /// attendee reached before the cycle closes, and on a dangling link it
    /// stops at the attendee holding the link. Both are logged. Returns
    /// `None` only when `id` itself does not exist.
    pub fn canonical_attendee(&self, id: i64) -> Result<Option<DbAttendee>, DbError> {
        let Some(mut current) = self.get_attendee(id)? else {
            return Ok(None);
        };
        let mut visited = HashSet::from([current.id]);

        while let AttendeeState::MergedInto(next_id) = current.state {
            if !visited.insert(next_id) {
                log::warn!(
                    "Attendee merge chain cycle: {} -> {} revisits a seen attendee (start {})",
                    current.id,
                    next_id,
                    id
                );
                break;
            }
            match self.get_attendee(next_id)? {
                Some(next) => current = next,
                None => {
                    log::warn!(
                        "Attendee {} is merged into missing attendee {}",
                        current.id,
                        next_id
                    );
                    break;
                }
            }
        }
        Ok(Some(current))
    }

    /// Record that an attendee was seen in a governing body at `seen_at`:
    /// widen the first/last seen window and add the body to its observed list.
    pub fn record_attendee_sighting(
        &self,
        attendee_id: i64,
        seen_at: &str,
        governing_body: &str,
    ) -> Result<(), DbError> {
        let attendee = self
            .get_attendee(attendee_id)?
            .ok_or_else(|| DbError::NotFound(format!("Attendee {attendee_id}")))?;
        let bodies = union_bodies(&attendee.governing_bodies, &[governing_body.to_string()]);
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE attendees SET
                first_seen_at = CASE
                    WHEN first_seen_at IS NULL OR ?1 < first_seen_at THEN ?1
                    ELSE first_seen_at
                END,
                last_seen_at = CASE
                    WHEN last_seen_at IS NULL OR ?1 > last_seen_at THEN ?1
                    ELSE last_seen_at
                END,
                governing_bodies = ?2,
                updated_at = ?3
             WHERE id = ?4",
            params![seen_at, encode_bodies(&bodies)?, now, attendee_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Document links
    // =========================================================================

    /// Link an attendee to a document. Returns false if the pair already existed.
    pub fn link_document_attendee(
        &self,
        document_id: i64,
        attendee_id: i64,
        role: Option<&str>,
        status: AttendanceStatus,
        source_text: Option<&str>,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO document_attendees
                (document_id, attendee_id, role, status, source_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![document_id, attendee_id, role, status.as_str(), source_text, now],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_document_attendees(
        &self,
        document_id: i64,
    ) -> Result<Vec<DbDocumentAttendee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document_id, attendee_id, role, status, source_text, created_at
             FROM document_attendees WHERE document_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![document_id], |row| {
            Ok(DbDocumentAttendee {
                id: row.get(0)?,
                document_id: row.get(1)?,
                attendee_id: row.get(2)?,
                role: row.get(3)?,
                status: AttendanceStatus::from_str_lossy(&row.get::<_, String>(4)?),
                source_text: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Authoritative appearance count for an attendee: its own join rows plus
    /// those of every attendee merged into it, directly or transitively.
    /// `UNION` (not `UNION ALL`) keeps the walk finite on a corrupted cycle.
    pub fn count_attendee_appearances(&self, attendee_id: i64) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "WITH RECURSIVE chain(id) AS (
                SELECT ?1
                UNION
                SELECT a.id FROM attendees a JOIN chain c ON a.merged_into_id = c.id
             )
             SELECT COUNT(*) FROM document_attendees
             WHERE attendee_id IN (SELECT id FROM chain)",
            params![attendee_id],
            |row| row.get(0),
        )?)
    }

    /// Recompute an attendee's appearance counter. Returns the new count.
    pub fn recompute_attendee_appearances(&self, attendee_id: i64) -> Result<i64, DbError> {
        let count = self.count_attendee_appearances(attendee_id)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE attendees SET appearances_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![count, now, attendee_id],
        )?;
        Ok(count)
    }

    // =========================================================================
    // Attendee-level merge / unmerge
    // =========================================================================

    /// Redirect `source_id` into `target_id` without deleting it.
    ///
    /// The source keeps its join rows and stays queryable through
    /// `canonical_attendee`; the target absorbs its governing bodies and has
    /// its counter recomputed over the whole merge chain.
    pub fn merge_attendees(
        &self,
        source_id: i64,
        target_id: i64,
    ) -> Result<AttendeeMergeResult, DbError> {
        self.with_transaction(|tx| {
            let source = tx
                .get_attendee(source_id)?
                .ok_or_else(|| DbError::NotFound(format!("Attendee {source_id}")))?;
            let target = tx
                .get_attendee(target_id)?
                .ok_or_else(|| DbError::NotFound(format!("Attendee {target_id}")))?;
            if source.state.is_merged() || target.state.is_merged() {
                return Err(DbError::Refused(
                    "Attendees already merged elsewhere cannot be merged again".into(),
                ));
            }

            let now = Utc::now().to_rfc3339();
            tx.conn.execute(
                "UPDATE attendees SET merged_into_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![target_id, now, source_id],
            )?;

            let bodies = union_bodies(&target.governing_bodies, &source.governing_bodies);
            tx.conn.execute(
                "UPDATE attendees SET governing_bodies = ?1, updated_at = ?2 WHERE id = ?3",
                params![encode_bodies(&bodies)?, now, target_id],
            )?;

            let target_appearances_after = tx.recompute_attendee_appearances(target_id)?;

            Ok(AttendeeMergeResult {
                target_appearances_before: target.appearances_count,
                target_appearances_after,
                governing_bodies: bodies,
            })
        })
    }

    /// Split one attendee off its shared Person into a brand-new Person named
    /// after the attendee. Refused when the attendee is the Person's only one.
    pub fn unmerge_attendee(&self, attendee_id: i64) -> Result<UnmergeResult, DbError> {
        self.with_transaction(|tx| {
            let attendee = tx
                .get_attendee(attendee_id)?
                .ok_or_else(|| DbError::NotFound(format!("Attendee {attendee_id}")))?;
            let original = tx
                .get_person(attendee.person_id)?
                .ok_or_else(|| DbError::NotFound(format!("Person {}", attendee.person_id)))?;
            if tx.count_person_attendees(original.id)? <= 1 {
                return Err(DbError::Refused(format!(
                    "Attendee {attendee_id} is the only identity of person {}",
                    original.id
                )));
            }

            let new_person = tx.insert_person(original.town_id, &attendee.name)?;
            let now = Utc::now().to_rfc3339();
            tx.conn.execute(
                "UPDATE attendees SET person_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_person.id, now, attendee_id],
            )?;

            let original_appearances_after = tx.recompute_person_appearances(original.id)?;
            let new_appearances = tx.recompute_person_appearances(new_person.id)?;

            Ok(UnmergeResult {
                original_person_id: original.id,
                new_person_id: new_person.id,
                original_appearances_after,
                new_appearances,
            })
        })
    }

    /// Move the attendees of `town_id`'s people from governing body
    /// `old_name` to `new_name`, in both the primary body and the observed
    /// list. Runs inside the caller's transaction. Refused when a moved
    /// attendee would collide with an active attendee already under the new
    /// name. Returns the people whose attendees changed.
    pub(crate) fn rename_attendee_body(
        &self,
        town_id: i64,
        old_name: &str,
        new_name: &str,
    ) -> Result<Vec<i64>, DbError> {
        let old_key = old_name.trim().to_lowercase();
        let new_name = new_name.trim();
        let attendees: Vec<DbAttendee> = {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {ATTENDEE_COLUMNS} FROM attendees
                 WHERE person_id IN (SELECT id FROM people WHERE town_id = ?1)
                 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![town_id], Self::map_attendee_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let now = Utc::now().to_rfc3339();
        let mut people = BTreeSet::new();
        for attendee in attendees {
            let primary_moves = attendee.governing_body.to_lowercase() == old_key;
            let list_moves = attendee
                .governing_bodies
                .iter()
                .any(|b| b.trim().to_lowercase() == old_key);
            if !primary_moves && !list_moves {
                continue;
            }

            let primary = if primary_moves {
                new_name.to_string()
            } else {
                attendee.governing_body.clone()
            };
            let renamed: Vec<String> = attendee
                .governing_bodies
                .iter()
                .map(|b| {
                    if b.trim().to_lowercase() == old_key {
                        new_name.to_string()
                    } else {
                        b.clone()
                    }
                })
                .collect();
            let bodies = union_bodies(&[], &renamed);

            let updated = self.conn.execute(
                "UPDATE attendees SET governing_body = ?1, governing_bodies = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![primary, encode_bodies(&bodies)?, now, attendee.id],
            );
            match updated.map_err(DbError::from) {
                Ok(_) => {
                    people.insert(attendee.person_id);
                }
                Err(e) if e.is_constraint_violation() => {
                    return Err(DbError::Refused(format!(
                        "Attendee '{}' already has an active identity in '{}'",
                        attendee.name, new_name
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(people.into_iter().collect())
    }

    pub(crate) fn map_attendee_row(row: &rusqlite::Row) -> rusqlite::Result<DbAttendee> {
        let bodies: String = row.get(5)?;
        let governing_bodies = serde_json::from_str(&bodies).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(DbAttendee {
            id: row.get(0)?,
            person_id: row.get(1)?,
            name: row.get(2)?,
            normalized_name: row.get(3)?,
            governing_body: row.get(4)?,
            governing_bodies,
            first_seen_at: row.get(6)?,
            last_seen_at: row.get(7)?,
            state: AttendeeState::from_column(row.get(8)?),
            appearances_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

/// Order-preserving union of two governing body lists (case-insensitive).
fn union_bodies(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = existing.iter().map(|b| b.to_lowercase()).collect();
    let mut out = existing.to_vec();
    for body in incoming {
        let body = body.trim();
        if !body.is_empty() && seen.insert(body.to_lowercase()) {
            out.push(body.to_string());
        }
    }
    out
}

fn encode_bodies(bodies: &[String]) -> Result<String, DbError> {
    Ok(serde_json::to_string(bodies)?)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    #[test]
    fn test_active_identity_is_unique() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        db.insert_attendee(p, "Jane Doe", "Select Board", None).expect("first");

        let err = db
            .insert_attendee(p, "Ms. Jane Doe", "Select Board", None)
            .unwrap_err();
        assert!(err.is_constraint_violation());

        // Same name in another body is a different identity.
        db.insert_attendee(p, "Jane Doe", "Planning Board", None)
            .expect("other body");
    }

    #[test]
    fn test_insert_or_fetch_recovers_from_race() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");

        let (first, created) = db
            .insert_attendee_or_fetch_existing(p, "Jane Doe", "Select Board", None)
            .expect("first");
        assert!(created);

        // A second worker that missed the row on lookup goes straight to insert.
        let (second, created) = db
            .insert_attendee_or_fetch_existing(p, "JANE  DOE", "Select Board", None)
            .expect("second");
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_canonical_follows_chain() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "J. Doe", "Select Board", &[]);
        let b = seed_attendee(&db, p, "Jane Do", "Select Board", &[]);
        let c = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);

        db.merge_attendees(a, b).expect("a -> b");
        db.merge_attendees(b, c).expect("b -> c");

        assert_eq!(db.canonical_attendee(a).unwrap().unwrap().id, c);
        assert_eq!(db.canonical_attendee(c).unwrap().unwrap().id, c);
        assert!(db.canonical_attendee(999).unwrap().is_none());
    }

    #[test]
    fn test_canonical_terminates_on_cycle() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);
        let b = seed_attendee(&db, p, "Jane Doe", "Planning Board", &[]);

        db.conn
            .execute_batch(&format!(
                "UPDATE attendees SET merged_into_id = {b} WHERE id = {a};
                 UPDATE attendees SET merged_into_id = {a} WHERE id = {b};"
            ))
            .unwrap();

        let from_a = db.canonical_attendee(a).unwrap().unwrap().id;
        let from_b = db.canonical_attendee(b).unwrap().unwrap().id;
        assert_eq!(from_a, b);
        assert_eq!(from_b, a);

        // Counting over the cycle terminates too.
        assert_eq!(db.count_attendee_appearances(a).unwrap(), 0);
    }

    #[test]
    fn test_self_merge_rejected_by_schema() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);
        let result = db.conn.execute(
            "UPDATE attendees SET merged_into_id = id WHERE id = ?1",
            params![a],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_attendees_unions_bodies_and_counts_chain() {
        let db = test_db();
        let (town, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let d1 = seed_document(&db, Some(body), "Jan", DocumentStatus::Complete, None);
        let d2 = seed_document(&db, Some(body), "Feb", DocumentStatus::Complete, None);
        let p = seed_person(&db, town, "Jane Doe");
        let q = seed_person(&db, town, "Jane Do");
        let source = seed_attendee(&db, q, "Jane Do", "Planning Board", &[d1]);
        let target = seed_attendee(&db, p, "Jane Doe", "Select Board", &[d2]);

        let result = db.merge_attendees(source, target).expect("merge");
        assert_eq!(result.target_appearances_before, 1);
        assert_eq!(result.target_appearances_after, 2);
        assert_eq!(result.governing_bodies, vec!["Select Board", "Planning Board"]);

        let src = db.get_attendee(source).unwrap().unwrap();
        assert_eq!(src.state, AttendeeState::MergedInto(target));
        assert_eq!(src.person_id, q, "attendee merge leaves ownership alone");

        // Already merged source cannot merge again.
        assert!(matches!(
            db.merge_attendees(source, target),
            Err(DbError::Refused(_))
        ));
    }

    #[test]
    fn test_unmerge_attendee_splits_person() {
        let db = test_db();
        let (town, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let d1 = seed_document(&db, Some(body), "Jan", DocumentStatus::Complete, None);
        let d2 = seed_document(&db, Some(body), "Feb", DocumentStatus::Complete, None);
        let d3 = seed_document(&db, Some(body), "Mar", DocumentStatus::Complete, None);
        let p = seed_person(&db, town, "John Smith");
        let keep = seed_attendee(&db, p, "John Smith", "Select Board", &[d1, d2]);
        let split = seed_attendee(&db, p, "Jon Smith", "Select Board", &[d3]);
        assert_eq!(db.get_person(p).unwrap().unwrap().appearances_count, 3);

        let result = db.unmerge_attendee(split).expect("unmerge");
        assert_eq!(result.original_person_id, p);
        assert_eq!(result.original_appearances_after, 2);
        assert_eq!(result.new_appearances, 1);

        let new_person = db.get_person(result.new_person_id).unwrap().unwrap();
        assert_eq!(new_person.name, "Jon Smith");
        assert_eq!(new_person.town_id, town);
        assert_eq!(db.get_attendee(split).unwrap().unwrap().person_id, new_person.id);
        assert_eq!(db.get_attendee(keep).unwrap().unwrap().person_id, p);

        // The original person now has a single attendee: nothing left to split.
        assert!(matches!(db.unmerge_attendee(keep), Err(DbError::Refused(_))));
    }

    #[test]
    fn test_record_sighting_widens_window() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        let a = db
            .insert_attendee(p, "Jane Doe", "Select Board", Some("2024-03-01"))
            .unwrap();

        db.record_attendee_sighting(a.id, "2024-01-15", "select board").unwrap();
        db.record_attendee_sighting(a.id, "2024-06-30", "Finance Committee").unwrap();

        let a = db.get_attendee(a.id).unwrap().unwrap();
        assert_eq!(a.first_seen_at.as_deref(), Some("2024-01-15"));
        assert_eq!(a.last_seen_at.as_deref(), Some("2024-06-30"));
        assert_eq!(a.governing_bodies, vec!["Select Board", "Finance Committee"]);
    }

    #[test]
    fn test_link_document_attendee_is_unique_per_pair() {
        let db = test_db();
        let (town, body) = seed_town_with_body(&db, "Ashby", "Select Board");
        let d1 = seed_document(&db, Some(body), "Jan", DocumentStatus::Complete, None);
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);

        assert!(db
            .link_document_attendee(d1, a, Some("chair"), AttendanceStatus::Remote, Some("Chair Doe (remote)"))
            .unwrap());
        assert!(!db
            .link_document_attendee(d1, a, None, AttendanceStatus::Present, None)
            .unwrap());

        let links = db.get_document_attendees(d1).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].role.as_deref(), Some("chair"));
        assert_eq!(links[0].status, AttendanceStatus::Remote);
    }

    #[test]
    fn test_corrupt_body_list_is_an_error_not_an_empty_list() {
        let db = test_db();
        let (town, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let p = seed_person(&db, town, "Jane Doe");
        let a = seed_attendee(&db, p, "Jane Doe", "Select Board", &[]);
        db.conn
            .execute(
                "UPDATE attendees SET governing_bodies = '[\"Select Board\"' WHERE id = ?1",
                params![a],
            )
            .unwrap();

        assert!(db.get_attendee(a).is_err());
        assert!(db
            .record_attendee_sighting(a, "2024-05-01T00:00:00Z", "Planning Board")
            .is_err());
        let raw: String = db
            .conn
            .query_row(
                "SELECT governing_bodies FROM attendees WHERE id = ?1",
                params![a],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, "[\"Select Board\"");
    }

    #[test]
    fn test_union_bodies_preserves_order() {
        let merged = union_bodies(
            &["Select Board".to_string()],
            &["SELECT BOARD".to_string(), " Planning Board ".to_string(), String::new()],
        );
        assert_eq!(merged, vec!["Select Board", "Planning Board"]);
    }
}
