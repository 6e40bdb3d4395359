//! Resource paths understood by the deadline store.
//!
//! ```text
//! count
//! deadlines
//! deadlines/archived
//! deadlines/archived/group/{g}
//! deadlines/archived/groups
//! deadlines/group/{g}
//! deadlines/groups
//! deadlines/{id}
//! groups
//! ```

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

/// Root resource. Change notifications are keyed by it.
pub const ROOT: &str = "deadlines";

/// Characters left as-is inside one path segment.
pub const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*');

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("unrecognized route: {0}")]
    Unrecognized(String),
}

/// Whether a list route reads active or archived deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Active,
    Archived,
}

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Count,
    Deadlines,
    ArchivedDeadlines,
    ArchivedDeadlinesInGroup(String),
    DeadlinesInGroup(String),
    Deadline(i64),
    Groups,
    ArchivedGroups,
    ActiveGroups,
}

impl Route {
    /// Parses a `/`-separated path. Segments are percent-decoded; a leading
    /// `/` is ignored.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments = trimmed
            .split('/')
            .map(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .map(|c| c.into_owned())
                    .map_err(|_| RouteError::Unrecognized(path.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        Self::from_segments(&refs).map_err(|_| RouteError::Unrecognized(path.to_string()))
    }

    /// Matches already-decoded segments against the route table.
    pub fn from_segments(segments: &[&str]) -> Result<Self, RouteError> {
        let route = match segments {
            ["count"] => Route::Count,
            ["groups"] => Route::Groups,
            ["deadlines"] => Route::Deadlines,
            ["deadlines", "archived"] => Route::ArchivedDeadlines,
            ["deadlines", "archived", "groups"] => Route::ArchivedGroups,
            ["deadlines", "archived", "group", g] if !g.is_empty() => {
                Route::ArchivedDeadlinesInGroup(g.to_string())
            }
            ["deadlines", "groups"] => Route::ActiveGroups,
            ["deadlines", "group", g] if !g.is_empty() => Route::DeadlinesInGroup(g.to_string()),
            ["deadlines", id] => match parse_id(id) {
                Some(id) => Route::Deadline(id),
                None => return Err(RouteError::Unrecognized(segments.join("/"))),
            },
            _ => return Err(RouteError::Unrecognized(segments.join("/"))),
        };
        Ok(route)
    }

    /// `Some` for routes subject to the archived/active split.
    pub fn partition(&self) -> Option<Partition> {
        match self {
            Route::Deadlines | Route::DeadlinesInGroup(_) | Route::ActiveGroups => {
                Some(Partition::Active)
            }
            Route::ArchivedDeadlines | Route::ArchivedDeadlinesInGroup(_) | Route::ArchivedGroups => {
                Some(Partition::Archived)
            }
            Route::Count | Route::Deadline(_) | Route::Groups => None,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            Route::DeadlinesInGroup(g) | Route::ArchivedDeadlinesInGroup(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_group_listing(&self) -> bool {
        matches!(self, Route::Groups | Route::ArchivedGroups | Route::ActiveGroups)
    }

    /// Canonical path, with the group segment percent-encoded.
    pub fn path(&self) -> String {
        match self {
            Route::Count => "count".into(),
            Route::Deadlines => ROOT.into(),
            Route::ArchivedDeadlines => format!("{ROOT}/archived"),
            Route::ArchivedDeadlinesInGroup(g) => {
                format!("{ROOT}/archived/group/{}", utf8_percent_encode(g, SEGMENT))
            }
            Route::DeadlinesInGroup(g) => format!("{ROOT}/group/{}", utf8_percent_encode(g, SEGMENT)),
            Route::Deadline(id) => format!("{ROOT}/{id}"),
            Route::Groups => "groups".into(),
            Route::ArchivedGroups => format!("{ROOT}/archived/groups"),
            Route::ActiveGroups => format!("{ROOT}/groups"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn parse_id(segment: &str) -> Option<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
