// Database schema: table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.
//
// Reactions are stored relationally but mirror the embedded document shape:
// counters live on the content row, the per-user map is `content_votes`, and
// the report log is `content_reports`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Content items (blog posts, video pages) with their aggregate counters
        CREATE TABLE IF NOT EXISTS content (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL DEFAULT 'blog',
            title TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            author_id TEXT,
            likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            unlikes INTEGER NOT NULL DEFAULT 0 CHECK (unlikes >= 0),
            created_at TEXT NOT NULL
        );

        -- Per-user last action on a content item (at most one row per user)
        CREATE TABLE IF NOT EXISTS content_votes (
            content_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('like', 'unlike', 'report')),
            PRIMARY KEY (content_id, user_id)
        );

        -- Append-only report log, one report per user per content item
        CREATE TABLE IF NOT EXISTS content_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_id TEXT NOT NULL,
            reported_by TEXT NOT NULL,
            report_text TEXT NOT NULL,
            reported_at TEXT NOT NULL,
            fixed INTEGER NOT NULL DEFAULT 0,
            UNIQUE (content_id, reported_by)
        );

        CREATE INDEX IF NOT EXISTS idx_content_created
            ON content(created_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: API keys managed through the admin surface.
    // Environment keys are merged with these at lookup time.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE TABLE api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT,
                token TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let count = table_count(&conn).unwrap();
        // schema_version, content, content_votes, content_reports, api_keys
        assert_eq!(count, 5i64);
    }

    #[test]
    fn test_counters_cannot_go_negative() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO content (id, title, created_at) VALUES ('c1', 't', '2024-01-01')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE content SET likes = likes - 1 WHERE id = 'c1'", []);
        assert!(result.is_err(), "CHECK constraint should reject likes < 0");
    }

    #[test]
    fn test_one_report_per_user() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let insert = "INSERT INTO content_reports (content_id, reported_by, report_text, reported_at)
                      VALUES ('c1', 'u1', 'spam', '2024-01-01')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }
}
