pub mod migrations;
pub mod models;
pub mod predicate;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

pub use models::{Cell, Column, Sort};
pub use predicate::{Filter, Predicate};

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A CHECK/NOT NULL/UNIQUE constraint rejected a write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// The deadline store. One connection; SQLite serializes writers and the
/// mutex serializes access from this process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            warn!("DB lock poisoned: {}", e);
            DbError::LockPoisoned
        })?;
        f(&conn)
    }
}

/// Sorts a failed write into constraint violations and everything else.
pub(crate) fn write_error(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => DbError::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopening_a_file_keeps_rows_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deadlines.db");

        let db = Database::open(&path).unwrap();
        db.insert_deadline(&deadlines_types::NewDeadline::new("dentist", 5)).unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        let rows = db.select_deadlines(&Predicate::all(), &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "dentist");
    }
}
