//! SQLite-backed store for towns, documents and the attendee identity graph.
//!
//! The relational tables are the single source of truth. The `search_index`
//! FTS table in the same file is a derived projection that can be dropped and
//! rebuilt at any time (see `services::search`).

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub mod types;
pub use types::*;

mod attendees;
mod audit;
mod documents;
mod people;
mod search_index;
mod suggestions;

pub use search_index::{SearchCountRow, SearchHitRow};
pub(crate) use search_index::{HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};

pub struct RecordsDb {
    conn: Connection,
}

impl RecordsDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(e.into());
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open the database at the configured path (or the default
    /// `~/.townrecords/townrecords.db`) and apply the schema.
    pub fn open(config: &crate::types::Config) -> Result<Self, DbError> {
        let path = match config.database_path.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => Self::default_path()?,
        };
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL lets detection runs and searches read while a merge writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.townrecords/townrecords.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".townrecords").join("townrecords.db"))
    }

    // =========================================================================
    // Towns
    // =========================================================================

    /// Insert a town, or return the existing one with the same normalized name.
    pub fn ensure_town(&self, name: &str) -> Result<DbTown, DbError> {
        let normalized = crate::normalize::normalize_name(name, false);
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO towns (name, normalized_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name.trim(), normalized, now],
        )?;
        let town = self.conn.query_row(
            "SELECT id, name, normalized_name, created_at, updated_at
             FROM towns WHERE normalized_name = ?1",
            params![normalized],
            Self::map_town_row,
        )?;
        Ok(town)
    }

    pub fn get_town(&self, id: i64) -> Result<Option<DbTown>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, normalized_name, created_at, updated_at
                 FROM towns WHERE id = ?1",
                params![id],
                Self::map_town_row,
            )
            .optional()?)
    }

    fn map_town_row(row: &rusqlite::Row) -> rusqlite::Result<DbTown> {
        Ok(DbTown {
            id: row.get(0)?,
            name: row.get(1)?,
            normalized_name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// Test temp dirs are cleaned up by the OS. Foreign keys stay enforced so the
    /// referential guards are exercised.
    pub fn test_db() -> RecordsDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        RecordsDb::open_at(path).expect("Failed to open test database")
    }

    /// Seed a town, a governing body inside it and return (town_id, body_id).
    pub fn seed_town_with_body(db: &RecordsDb, town: &str, body: &str) -> (i64, i64) {
        let town = db.ensure_town(town).expect("town");
        let body = db
            .ensure_governing_body(Some(town.id), body)
            .expect("governing body");
        (town.id, body.id)
    }

    /// Seed a person with no attendees.
    pub fn seed_person(db: &RecordsDb, town_id: i64, name: &str) -> i64 {
        db.insert_person(town_id, name).expect("insert person").id
    }

    /// Seed a document in the given state.
    pub fn seed_document(
        db: &RecordsDb,
        body_id: Option<i64>,
        title: &str,
        status: DocumentStatus,
        metadata: Option<&str>,
    ) -> i64 {
        let id = db
            .insert_document(body_id, title, metadata, None)
            .expect("insert document");
        db.update_document_status(id, status).expect("status");
        id
    }

    /// Seed an attendee for `person_id` appearing in each of `document_ids`.
    pub fn seed_attendee(
        db: &RecordsDb,
        person_id: i64,
        name: &str,
        body: &str,
        document_ids: &[i64],
    ) -> i64 {
        let attendee = db
            .insert_attendee(person_id, name, body, None)
            .expect("insert attendee");
        for doc in document_ids {
            db.link_document_attendee(*doc, attendee.id, None, AttendanceStatus::Present, None)
                .expect("link");
        }
        db.recompute_attendee_appearances(attendee.id).expect("attendee count");
        db.recompute_person_appearances(person_id).expect("person count");
        attendee.id
    }
}
