use super::*;
use crate::duplicates::DuplicatePair;

/// Rows per multi-value INSERT. Five bound parameters per row keeps each
/// statement well under SQLite's variable limit.
const INSERT_CHUNK: usize = 500;

impl RecordsDb {
    // =========================================================================
    // Duplicate suggestions
    // =========================================================================

    /// Replace the whole suggestion set with `pairs` (full rebuild).
    ///
    /// The delete and the chunked bulk insert share one transaction, so a
    /// failed run leaves the previous set in place. Returns rows inserted.
    pub fn replace_duplicate_suggestions(&self, pairs: &[DuplicatePair]) -> Result<usize, DbError> {
        self.with_transaction(|tx| {
            tx.conn.execute("DELETE FROM duplicate_suggestions", [])?;
            let now = Utc::now().to_rfc3339();
            let mut inserted = 0;
            for chunk in pairs.chunks(INSERT_CHUNK) {
                let values = vec!["(?, ?, ?, ?, ?)"; chunk.len()].join(", ");
                let sql = format!(
                    "INSERT INTO duplicate_suggestions
                        (person_id, duplicate_person_id, match_type, similarity_score, created_at)
                     VALUES {values}"
                );
                let mut bound: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() * 5);
                for pair in chunk {
                    let (low, high) = pair.ordered_ids();
                    bound.push(low.into());
                    bound.push(high.into());
                    bound.push(pair.match_type.as_str().to_string().into());
                    bound.push((pair.score as i64).into());
                    bound.push(now.clone().into());
                }
                inserted += tx
                    .conn
                    .execute(&sql, rusqlite::params_from_iter(bound))?;
            }
            Ok(inserted)
        })
    }

    /// All suggestions, ordered by (person_id, duplicate_person_id).
    pub fn get_duplicate_suggestions(&self) -> Result<Vec<DbDuplicateSuggestion>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_id, duplicate_person_id, match_type, similarity_score, created_at
             FROM duplicate_suggestions ORDER BY person_id, duplicate_person_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbDuplicateSuggestion {
                id: row.get(0)?,
                person_id: row.get(1)?,
                duplicate_person_id: row.get(2)?,
                match_type: MatchType::from_str_lossy(&row.get::<_, String>(3)?),
                similarity_score: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Drop every suggestion that mentions `person_id` on either side.
    pub fn delete_suggestions_for_person(&self, person_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM duplicate_suggestions WHERE person_id = ?1 OR duplicate_person_id = ?1",
            params![person_id],
        )?)
    }
}
