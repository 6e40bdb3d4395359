use deadlines_types::{Deadline, DeadlineUpdate, GroupRow, NewDeadline};
use rusqlite::types::Value;
use rusqlite::{Row, params_from_iter};
use tracing::debug;

use crate::models::{Cell, Column, Sort, order_by};
use crate::predicate::{Predicate, id_is};
use crate::{Database, Result, write_error};

const DEADLINE_COLUMNS: &str = "id, label, group_name, due_date, done";
const DEADLINE_ORDER: [Sort; 2] = [
    Sort {
        column: Column::DueDate,
        descending: false,
    },
    Sort {
        column: Column::Id,
        descending: false,
    },
];
const GROUP_ORDER: [Sort; 1] = [Sort {
    column: Column::Group,
    descending: false,
}];

impl Database {
    // -- Reads --

    pub fn select_deadlines(&self, predicate: &Predicate, sort: &[Sort]) -> Result<Vec<Deadline>> {
        let sql = format!(
            "SELECT {} FROM deadlines WHERE {}{}",
            DEADLINE_COLUMNS,
            predicate.sql(),
            order_by(sort, &DEADLINE_ORDER)
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(predicate.params()), map_deadline)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn select_deadline(&self, id: i64) -> Result<Option<Deadline>> {
        Ok(self.select_deadlines(&id_is(id), &[])?.into_iter().next())
    }

    /// Projected read: one `Vec<Cell>` per row, in `columns` order.
    pub fn select_columns(
        &self,
        predicate: &Predicate,
        columns: &[Column],
        sort: &[Sort],
    ) -> Result<Vec<Vec<Cell>>> {
        let columns = if columns.is_empty() { &Column::ALL[..] } else { columns };
        let select: Vec<&str> = columns.iter().map(|c| c.sql_name()).collect();
        let sql = format!(
            "SELECT {} FROM deadlines WHERE {}{}",
            select.join(", "),
            predicate.sql(),
            order_by(sort, &DEADLINE_ORDER)
        );
        let width = columns.len();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(predicate.params()), |row| {
                    (0..width)
                        .map(|i| row.get_ref(i).map(Cell::from))
                        .collect::<std::result::Result<Vec<_>, _>>()
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct groups among rows matching `predicate`.
    pub fn select_groups(&self, predicate: &Predicate, sort: &[Sort]) -> Result<Vec<GroupRow>> {
        let sql = format!(
            "SELECT MIN(id) AS id, group_name FROM deadlines WHERE {} GROUP BY group_name{}",
            predicate.sql(),
            order_by(sort, &GROUP_ORDER)
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(predicate.params()), |row| {
                    Ok(GroupRow {
                        id: row.get(0)?,
                        group: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count(&self, predicate: &Predicate) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM deadlines WHERE {}", predicate.sql());
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(&sql, params_from_iter(predicate.params()), |r| r.get(0))?;
            Ok(n.max(0) as u64)
        })
    }

    /// Not-done deadlines due on or before each limit, all read under one lock.
    pub fn count_not_done_due_by(&self, limits: &[i64]) -> Result<Vec<u64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT COUNT(*) FROM deadlines WHERE due_date <= ?1 AND done = 0")?;
            let mut counts = Vec::with_capacity(limits.len());
            for limit in limits {
                let n: i64 = stmt.query_row([limit], |r| r.get(0))?;
                counts.push(n.max(0) as u64);
            }
            Ok(counts)
        })
    }

    // -- Writes --

    /// Inserts as given; default-group substitution is the caller's job.
    pub fn insert_deadline(&self, new: &NewDeadline) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO deadlines (label, group_name, due_date, done) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![new.label, new.group, new.due_date, new.done],
            )
            .map_err(write_error)?;
            let id = conn.last_insert_rowid();
            debug!(id, "Inserted deadline");
            Ok(id)
        })
    }

    /// Returns the number of rows changed. An empty update writes nothing and
    /// reports whether the row exists.
    pub fn update_deadline(&self, id: i64, changes: &DeadlineUpdate) -> Result<usize> {
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(label) = &changes.label {
            sets.push("label = ?");
            params.push(Value::Text(label.clone()));
        }
        if let Some(group) = &changes.group {
            sets.push("group_name = ?");
            params.push(Value::Text(group.clone()));
        }
        if let Some(due_date) = changes.due_date {
            sets.push("due_date = ?");
            params.push(Value::Integer(due_date));
        }
        if let Some(done) = changes.done {
            sets.push("done = ?");
            params.push(Value::Integer(i64::from(done)));
        }

        if sets.is_empty() {
            return Ok(self.count(&id_is(id))? as usize);
        }

        params.push(Value::Integer(id));
        let sql = format!("UPDATE deadlines SET {} WHERE id = ?", sets.join(", "));
        self.with_conn(|conn| {
            let n = conn
                .execute(&sql, params_from_iter(params.iter()))
                .map_err(write_error)?;
            Ok(n)
        })
    }

    pub fn delete_deadline(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM deadlines WHERE id = ?1", [id])?;
            Ok(n)
        })
    }
}

fn map_deadline(row: &Row<'_>) -> rusqlite::Result<Deadline> {
    Ok(Deadline {
        id: row.get(0)?,
        label: row.get(1)?,
        group: row.get(2)?,
        due_date: row.get(3)?,
        done: row.get::<_, i64>(4)? != 0,
    })
}
