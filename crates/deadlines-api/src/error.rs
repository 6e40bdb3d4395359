use deadlines_db::DbError;
use deadlines_types::{Route, RouteError};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything the engine can fail with. Nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized route: {0}")]
    UnrecognizedRoute(String),

    #[error("{operation} is not valid for route {route}")]
    InvalidOperationForRoute {
        operation: Operation,
        route: String,
    },

    #[error("malformed backup record: {reason}")]
    MalformedBackupRecord { reason: String },

    #[error("backup unreadable: {0}")]
    BackupUnreadable(#[source] std::io::Error),

    #[error("backup could not be written: {0}")]
    BackupWrite(#[source] std::io::Error),

    #[error("insert failed: {0}")]
    InsertFailed(String),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedBackupRecord {
            reason: reason.into(),
        }
    }
}

impl From<RouteError> for Error {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::Unrecognized(path) => Error::UnrecognizedRoute(path),
        }
    }
}

/// The write operations a route may or may not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Whether `route` accepts this write: inserts go through `deadlines`,
    /// updates and deletes through `deadlines/{id}`.
    pub fn check(self, route: &Route) -> Result<()> {
        let accepted = match self {
            Operation::Insert => *route == Route::Deadlines,
            Operation::Update | Operation::Delete => matches!(route, Route::Deadline(_)),
        };
        if accepted {
            Ok(())
        } else {
            Err(self.rejected(route))
        }
    }

    pub(crate) fn rejected(self, route: &Route) -> Error {
        Error::InvalidOperationForRoute {
            operation: self,
            route: route.path(),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}
