use rusqlite::{Connection, Result};

pub const SCHEMA_VERSION: u32 = 1;

/// Tables every database must contain after migration.
pub const REQUIRED_TABLES: &[&str] = &["schema_versions", "collections", "issue_records"];

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // One row per collection; model + dimension is the embedding signature
    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dimension INTEGER NOT NULL CHECK (dimension > 0),
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Vectors live in a per-collection vec0 table keyed by this id
    conn.execute(
        "CREATE TABLE IF NOT EXISTS issue_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            issue_id TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}', -- JSON object
            created_at TEXT NOT NULL,
            FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE,
            UNIQUE(collection, issue_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_issue_records_collection ON issue_records(collection)",
        [],
    )?;

    Ok(())
}
