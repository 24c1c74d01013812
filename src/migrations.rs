//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/002_search_index.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("migrations/003_audit_logs.sql"),
    },
];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Hot-copy an existing on-disk database to `<path>.pre-migration.bak`
/// with the online backup API. Fresh and in-memory databases are skipped.
fn backup_before_migration(conn: &Connection, current: i32) -> Result<(), String> {
    let Some(path) = conn.path().filter(|p| !p.is_empty() && *p != ":memory:") else {
        return Ok(());
    };
    if current == 0 {
        return Ok(());
    }

    let backup_path = format!("{path}.pre-migration.bak");
    let mut target = Connection::open(&backup_path)
        .map_err(|e| format!("Cannot open backup file {backup_path}: {e}"))?;
    rusqlite::backup::Backup::new(conn, &mut target)
        .and_then(|backup| backup.step(-1).map(|_| ()))
        .map_err(|e| format!("Pre-migration backup failed: {e}"))?;

    log::info!("Schema v{} backed up to {}", current, backup_path);
    Ok(())
}

/// Apply one migration and record it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> Result<(), String> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("Migration v{}: cannot begin: {e}", migration.version))?;
    tx.execute_batch(migration.sql)
        .map_err(|e| format!("Migration v{} failed: {e}", migration.version))?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [migration.version],
    )
    .map_err(|e| format!("Migration v{}: cannot record version: {e}", migration.version))?;
    tx.commit()
        .map_err(|e| format!("Migration v{}: commit failed: {e}", migration.version))
}

/// Bring the schema up to date. Returns how many migrations ran.
///
/// A database whose recorded version is beyond the newest embedded
/// migration was written by a newer build and is left untouched.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let newest = MIGRATIONS.last().map_or(0, |m| m.version);
    if current > newest {
        return Err(format!(
            "Database schema version ({current}) is newer than this version of townrecords supports ({newest})"
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn, current)?;
    for migration in &pending {
        apply(conn, migration)?;
        log::info!("Applied migration v{}", migration.version);
    }
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_all_migrations() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&conn).expect("version"), 3);

        for table in [
            "towns",
            "governing_bodies",
            "documents",
            "people",
            "attendees",
            "document_attendees",
            "duplicate_suggestions",
            "search_index",
            "audit_logs",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap_or_else(|e| panic!("{table} should exist: {e}"));
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_suggestion_ordering_is_enforced() {
        let conn = mem_db();
        run_migrations(&conn).expect("migrations");
        conn.execute_batch(
            "INSERT INTO towns (name, normalized_name, created_at, updated_at)
             VALUES ('Ashby', 'ashby', 'now', 'now');
             INSERT INTO people (town_id, name, normalized_name, created_at, updated_at)
             VALUES (1, 'A', 'a', 'now', 'now'), (1, 'B', 'b', 'now', 'now');",
        )
        .expect("seed");

        let reversed = conn.execute(
            "INSERT INTO duplicate_suggestions
             (person_id, duplicate_person_id, match_type, similarity_score, created_at)
             VALUES (2, 1, 'exact', 0, 'now')",
            [],
        );
        assert!(reversed.is_err(), "larger id first must be rejected");
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(
            err.contains("newer than this version"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();
        let first = run_migrations(&conn).expect("first run");
        assert_eq!(first, 3);

        let second = run_migrations(&conn).expect("second run");
        assert_eq!(second, 0, "second run should apply no migrations");
        assert_eq!(current_version(&conn).expect("version"), 3);
    }

    #[test]
    fn test_pre_migration_backup_created_for_existing_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test_backup.db");

        let conn = Connection::open(&db_path).expect("open db");
        ensure_schema_version_table(&conn).unwrap();
        conn.execute_batch(include_str!("migrations/001_baseline.sql"))
            .unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();

        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 2);

        let backup_path = dir.path().join("test_backup.db.pre-migration.bak");
        assert!(
            backup_path.exists(),
            "pre-migration backup should be created at {}",
            backup_path.display()
        );
    }
}
