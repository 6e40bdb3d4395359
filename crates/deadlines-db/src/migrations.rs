use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (deadlines table)");
        conn.execute_batch(
            "
            CREATE TABLE deadlines (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                label       TEXT NOT NULL CHECK (label <> ''),
                group_name  TEXT,
                due_date    INTEGER NOT NULL CHECK (due_date >= 0),
                done        INTEGER NOT NULL DEFAULT 0 CHECK (done IN (0, 1))
            );

            CREATE INDEX idx_deadlines_due_date ON deadlines(due_date);
            CREATE INDEX idx_deadlines_group ON deadlines(group_name);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}
