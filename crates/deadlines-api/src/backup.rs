//! Line-oriented backup format.
//!
//! One deadline per line, as a URL whose path holds four segments:
//!
//! ```text
//! http://sd.casimir-lab.net/{label}/{group}/{due_date}/{done}
//! ```
//!
//! Segments are percent-encoded. A deadline without a group is written as the
//! single byte 0 (`%00`) so that it cannot be confused with a group segment.
//! The same encoding is used for sharing a single deadline.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use percent_encoding::{percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use tracing::{info, warn};

use deadlines_types::route::SEGMENT;
use deadlines_types::{Clock, Deadline, NewDeadline, Route};

use crate::error::{Error, Result};
use crate::provider::Provider;

pub const SHARE_BASE: &str = "http://sd.casimir-lab.net";
pub const BACKUP_FILENAME: &str = "backup.sd";

const NO_GROUP: &str = "%00";

/// Encodes one record as a backup line (without the trailing newline).
pub fn encode(record: &NewDeadline) -> String {
    let group = match record.group.as_deref() {
        None | Some("") => NO_GROUP.to_string(),
        Some(g) => utf8_percent_encode(g, SEGMENT).to_string(),
    };
    format!(
        "{}/{}/{}/{}/{}",
        SHARE_BASE,
        utf8_percent_encode(&record.label, SEGMENT),
        group,
        record.due_date,
        u8::from(record.done)
    )
}

/// Link for sharing one stored deadline.
pub fn share_link(deadline: &Deadline) -> String {
    encode(&NewDeadline::from(deadline.clone()))
}

/// Decodes one backup line. The scheme and authority are optional.
pub fn decode(line: &str) -> Result<NewDeadline> {
    let path = path_of(line.trim_end_matches(['\r', '\n']));
    let path = path.strip_prefix('/').unwrap_or(path);

    let segments: Vec<&str> = path.split('/').collect();
    let [label, group, due_date, done] = segments.as_slice() else {
        return Err(Error::malformed(format!(
            "expected 4 path segments, found {}: {}",
            segments.len(),
            line
        )));
    };

    let label = unescape(label, line)?;
    if label.is_empty() {
        return Err(Error::malformed(format!("empty label: {line}")));
    }

    let group = unescape(group, line)?;
    let group = if group.as_bytes().first() == Some(&0) {
        None
    } else {
        Some(group)
    };

    let due_date = digits(&unescape(due_date, line)?, "date", line)?;
    let done = match digits(&unescape(done, line)?, "done state", line)? {
        0 => false,
        1 => true,
        n => return Err(Error::malformed(format!("done state {n} is not 0 or 1: {line}"))),
    };

    Ok(NewDeadline {
        label,
        group,
        due_date,
        done,
    })
}

/// Drops `scheme://authority` plus any query or fragment.
fn path_of(line: &str) -> &str {
    let path = match line.find("://") {
        Some(i) => {
            let rest = &line[i + 3..];
            rest.find('/').map_or("", |p| &rest[p..])
        }
        None => line,
    };
    match path.find(['?', '#']) {
        Some(end) => &path[..end],
        None => path,
    }
}

fn unescape(segment: &str, line: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Error::malformed(format!("invalid UTF-8 in segment: {line}")))
}

fn digits(segment: &str, what: &str, line: &str) -> Result<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed(format!("malformed {what}: {line}")));
    }
    segment
        .parse()
        .map_err(|_| Error::malformed(format!("{what} out of range: {line}")))
}

/// Every stored deadline: active first, then archived. Both halves are
/// split at the same instant so each row lands in exactly one of them.
pub fn backup_records(provider: &Provider) -> Result<Vec<Deadline>> {
    let now = provider.clock().now_millis();
    let db = provider.database();
    let mut records = db.select_deadlines(&provider.route_predicate_at(&Route::Deadlines, now), &[])?;
    records.extend(db.select_deadlines(
        &provider.route_predicate_at(&Route::ArchivedDeadlines, now),
        &[],
    )?);
    Ok(records)
}

/// The full backup as text, newline-separated, no trailing newline.
pub fn backup_text(provider: &Provider) -> Result<String> {
    let lines: Vec<String> = backup_records(provider)?.iter().map(share_link).collect();
    Ok(lines.join("\n"))
}

/// Writes the full backup to `path`. Returns the number of records written.
pub fn write_backup_file(provider: &Provider, path: &Path) -> Result<usize> {
    let records = backup_records(provider)?;
    let text = records.iter().map(share_link).collect::<Vec<_>>().join("\n");

    let mut file = File::create(path).map_err(Error::BackupWrite)?;
    file.write_all(text.as_bytes()).map_err(Error::BackupWrite)?;
    file.sync_all().map_err(Error::BackupWrite)?;

    info!("Backup of {} deadlines written to {}", records.len(), path.display());
    Ok(records.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub inserted: usize,
    pub skipped: Vec<SkippedLine>,
}

/// Inserts every decodable line from `reader`. Bad lines are skipped and
/// reported; a read failure aborts, keeping what was already inserted.
pub fn restore<R: BufRead>(provider: &Provider, reader: R) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::BackupUnreadable)?;
        if line.trim().is_empty() {
            continue;
        }

        let outcome = decode(&line).and_then(|record| provider.insert(&Route::Deadlines, record));
        match outcome {
            Ok(_) => report.inserted += 1,
            Err(e @ (Error::MalformedBackupRecord { .. } | Error::InsertFailed(_))) => {
                warn!(line = idx + 1, "Skipping backup line: {}", e);
                report.skipped.push(SkippedLine {
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        inserted = report.inserted,
        skipped = report.skipped.len(),
        "Restore finished"
    );
    Ok(report)
}

pub fn restore_file(provider: &Provider, path: &Path) -> Result<RestoreReport> {
    let file = File::open(path).map_err(Error::BackupUnreadable)?;
    restore(provider, BufReader::new(file))
}
