//! Column names and value types as they appear in SQL.

use rusqlite::types::ValueRef;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Label,
    Group,
    DueDate,
    Done,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::Label,
        Column::Group,
        Column::DueDate,
        Column::Done,
    ];

    pub fn sql_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Label => "label",
            Column::Group => "group_name",
            Column::DueDate => "due_date",
            Column::Done => "done",
        }
    }

    /// Accepts both the SQL name and the API name (`group`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Column::Id),
            "label" => Some(Column::Label),
            "group" | "group_name" => Some(Column::Group),
            "due_date" => Some(Column::DueDate),
            "done" => Some(Column::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: Column,
    pub descending: bool,
}

impl Sort {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// `ORDER BY` clause for `sort`, or for `fallback` when `sort` is empty.
pub(crate) fn order_by(sort: &[Sort], fallback: &[Sort]) -> String {
    let sort = if sort.is_empty() { fallback } else { sort };
    if sort.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = sort
        .iter()
        .map(|s| {
            format!(
                "{} {}",
                s.column.sql_name(),
                if s.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    format!(" ORDER BY {}", terms.join(", "))
}

/// One projected value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_falls_back() {
        assert_eq!(order_by(&[], &[]), "");
        assert_eq!(
            order_by(&[], &[Sort::asc(Column::DueDate), Sort::asc(Column::Id)]),
            " ORDER BY due_date ASC, id ASC"
        );
        assert_eq!(
            order_by(&[Sort::desc(Column::Label)], &[Sort::asc(Column::Id)]),
            " ORDER BY label DESC"
        );
    }

    #[test]
    fn column_names_round_trip() {
        for column in Column::ALL {
            assert_eq!(Column::from_name(column.sql_name()), Some(column));
        }
        assert_eq!(Column::from_name("group"), Some(Column::Group));
        assert_eq!(Column::from_name("label; DROP TABLE deadlines"), None);
    }
}
