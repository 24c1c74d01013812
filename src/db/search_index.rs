use super::*;

/// Private-use characters wrapped around matched terms by `snippet()`.
/// They are stripped from indexed content so only real matches carry them.
pub(crate) const HIGHLIGHT_OPEN: char = '\u{E000}';
pub(crate) const HIGHLIGHT_CLOSE: char = '\u{E001}';

/// Tokens of context returned around the best match.
const SNIPPET_TOKENS: i32 = 20;

/// One ranked match from the FTS table, before snippet sanitization.
#[derive(Debug, Clone)]
pub struct SearchHitRow {
    pub entity_type: String,
    pub entity_id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub url: String,
    pub raw_snippet: String,
    pub rank: f64,
}

#[derive(Debug, Clone)]
pub struct SearchCountRow {
    pub entity_type: String,
    pub count: i64,
}

impl RecordsDb {
    // =========================================================================
    // Search index (FTS5)
    // =========================================================================

    /// Remove every entry for (entity_type, entity_id).
    pub fn clear_search_entity(&self, entity_type: &str, entity_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM search_index
             WHERE entity_type = ?1 AND CAST(entity_id AS INTEGER) = ?2",
            params![entity_type, entity_id],
        )?)
    }

    pub fn insert_search_entry(&self, entry: &DbSearchEntry) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO search_index (entity_type, entity_id, title, subtitle, content, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.entity_type,
                entry.entity_id,
                strip_highlight_markers(&entry.title),
                entry.subtitle.as_deref().map(strip_highlight_markers),
                strip_highlight_markers(&entry.content),
                entry.url
            ],
        )?;
        Ok(())
    }

    /// Drop the whole index.
    pub fn clear_search_index(&self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM search_index", [])?)
    }

    /// Entries currently stored for (entity_type, entity_id).
    pub fn get_search_entries(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<DbSearchEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, CAST(entity_id AS INTEGER), title, subtitle, content, url
             FROM search_index
             WHERE entity_type = ?1 AND CAST(entity_id AS INTEGER) = ?2
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            Ok(DbSearchEntry {
                entity_type: row.get(0)?,
                entity_id: row.get(1)?,
                title: row.get(2)?,
                subtitle: row.get(3)?,
                content: row.get(4)?,
                url: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Run an already-sanitized FTS5 match expression, ranked by bm25
    /// (ascending), optionally restricted to `entity_types`.
    pub fn search_index_matches(
        &self,
        fts_query: &str,
        entity_types: &[&str],
        limit: usize,
    ) -> Result<Vec<SearchHitRow>, DbError> {
        let type_filter = if entity_types.is_empty() {
            String::new()
        } else {
            format!(
                " AND entity_type IN ({})",
                vec!["?"; entity_types.len()].join(", ")
            )
        };
        let sql = format!(
            "SELECT entity_type, CAST(entity_id AS INTEGER), title, subtitle, url,
                    snippet(search_index, 4, '{HIGHLIGHT_OPEN}', '{HIGHLIGHT_CLOSE}', '...', {SNIPPET_TOKENS}),
                    rank
             FROM search_index
             WHERE search_index MATCH ?{type_filter}
             ORDER BY rank
             LIMIT ?"
        );

        let mut bound: Vec<rusqlite::types::Value> = Vec::with_capacity(entity_types.len() + 2);
        bound.push(fts_query.to_string().into());
        for t in entity_types {
            bound.push(t.to_string().into());
        }
        bound.push((limit.min(i64::MAX as usize) as i64).into());

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bound), |row| {
            Ok(SearchHitRow {
                entity_type: row.get(0)?,
                entity_id: row.get(1)?,
                title: row.get(2)?,
                subtitle: row.get(3)?,
                url: row.get(4)?,
                raw_snippet: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                rank: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Count matches per entity type for an already-sanitized FTS5 expression.
    pub fn search_index_counts(&self, fts_query: &str) -> Result<Vec<SearchCountRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, COUNT(*) FROM search_index
             WHERE search_index MATCH ?1
             GROUP BY entity_type",
        )?;
        let rows = stmt.query_map(params![fts_query], |row| {
            Ok(SearchCountRow {
                entity_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn strip_highlight_markers(s: &str) -> String {
    s.chars()
        .filter(|c| *c != HIGHLIGHT_OPEN && *c != HIGHLIGHT_CLOSE)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn entry(entity_type: &str, id: i64, title: &str, content: &str) -> DbSearchEntry {
        DbSearchEntry {
            entity_type: entity_type.to_string(),
            entity_id: id,
            title: title.to_string(),
            subtitle: None,
            content: content.to_string(),
            url: format!("/{entity_type}/{id}"),
        }
    }

    #[test]
    fn test_insert_match_and_clear() {
        let db = test_db();
        db.insert_search_entry(&entry("document", 7, "Minutes", "The budget proposal was discussed"))
            .unwrap();

        let hits = db.search_index_matches("\"budget\"*", &[], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity_id, 7);
        assert!(hits[0]
            .raw_snippet
            .contains(&format!("{HIGHLIGHT_OPEN}budget{HIGHLIGHT_CLOSE}")));

        assert_eq!(db.clear_search_entity("document", 7).unwrap(), 1);
        assert!(db.search_index_matches("\"budget\"*", &[], 10).unwrap().is_empty());
    }

    #[test]
    fn test_type_filter_and_counts() {
        let db = test_db();
        db.insert_search_entry(&entry("document", 1, "Minutes", "Harbor dredging")).unwrap();
        db.insert_search_entry(&entry("person", 2, "Harbor Master", "Harbor Master")).unwrap();

        let docs = db.search_index_matches("\"harbor\"*", &["document"], 10).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].entity_type, "document");

        let mut counts = db.search_index_counts("\"harbor\"*").unwrap();
        counts.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        assert_eq!(counts.len(), 2);
        assert_eq!((counts[0].entity_type.as_str(), counts[0].count), ("document", 1));
        assert_eq!((counts[1].entity_type.as_str(), counts[1].count), ("person", 1));
    }

    #[test]
    fn test_markers_stripped_on_insert() {
        let db = test_db();
        let content = format!("forged {HIGHLIGHT_OPEN}marker{HIGHLIGHT_CLOSE} text");
        db.insert_search_entry(&entry("document", 3, "Doc", &content)).unwrap();
        let stored = db.get_search_entries("document", 3).unwrap();
        assert_eq!(stored[0].content, "forged marker text");
    }
}
