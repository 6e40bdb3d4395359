//! `WHERE` clauses built from parts, with every value bound as a parameter.

use rusqlite::types::Value;

/// A conjunction of SQL boolean clauses plus their positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicate {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds `clause`, whose `?` placeholders are filled by `params` in order.
    pub fn and(mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        self.clauses.push(clause.into());
        self.params.extend(params);
        self
    }

    pub fn and_predicate(mut self, other: Predicate) -> Self {
        self.clauses.extend(other.clauses);
        self.params.extend(other.params);
        self
    }

    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            return "1".into();
        }
        self.clauses
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Archived means done and already past due. Everything else is active.
pub fn partition(now_ms: i64, archived: bool) -> Predicate {
    let clause = if archived {
        "done = 1 AND due_date < ?"
    } else {
        "NOT (done = 1 AND due_date < ?)"
    };
    Predicate::all().and(clause, [Value::Integer(now_ms)])
}

/// Exact, case-sensitive match on the group column.
pub fn group_is(group: &str) -> Predicate {
    Predicate::all().and("group_name = ?", [Value::Text(group.to_string())])
}

pub fn id_is(id: i64) -> Predicate {
    Predicate::all().and("id = ?", [Value::Integer(id)])
}

/// Caller-supplied narrowing, applied on top of a route's own predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    DueOnOrBefore(i64),
    DueAfter(i64),
    Done(bool),
    GroupIs(String),
    All(Vec<Filter>),
}

impl Filter {
    pub fn to_predicate(&self) -> Predicate {
        match self {
            Filter::DueOnOrBefore(ms) => Predicate::all().and("due_date <= ?", [Value::Integer(*ms)]),
            Filter::DueAfter(ms) => Predicate::all().and("due_date > ?", [Value::Integer(*ms)]),
            Filter::Done(done) => Predicate::all().and("done = ?", [Value::Integer(i64::from(*done))]),
            Filter::GroupIs(group) => group_is(group),
            Filter::All(filters) => filters
                .iter()
                .fold(Predicate::all(), |acc, f| acc.and_predicate(f.to_predicate())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_predicate_matches_everything() {
        let p = Predicate::all();
        assert_eq!(p.sql(), "1");
        assert!(p.params().is_empty());
    }

    #[test]
    fn active_partition_negates_archived() {
        let archived = partition(1_000, true);
        assert_eq!(archived.sql(), "(done = 1 AND due_date < ?)");
        assert_eq!(archived.params(), &[Value::Integer(1_000)]);

        let active = partition(1_000, false);
        assert_eq!(active.sql(), "(NOT (done = 1 AND due_date < ?))");
        assert_eq!(active.params(), &[Value::Integer(1_000)]);
    }

    #[test]
    fn group_values_are_bound_not_spliced() {
        let p = partition(5, false).and_predicate(group_is("o'brien\" OR 1=1 --"));
        assert_eq!(p.sql(), "(NOT (done = 1 AND due_date < ?)) AND (group_name = ?)");
        assert!(!p.sql().contains("brien"));
        assert_eq!(
            p.params(),
            &[
                Value::Integer(5),
                Value::Text("o'brien\" OR 1=1 --".into())
            ]
        );
    }

    #[test]
    fn nested_filters_flatten_in_order() {
        let f = Filter::All(vec![
            Filter::Done(false),
            Filter::All(vec![Filter::DueOnOrBefore(10), Filter::DueAfter(2)]),
        ]);
        let p = f.to_predicate();
        assert_eq!(p.sql(), "(done = ?) AND (due_date <= ?) AND (due_date > ?)");
        assert_eq!(
            p.params(),
            &[Value::Integer(0), Value::Integer(10), Value::Integer(2)]
        );
        assert_eq!(Filter::All(vec![]).to_predicate().sql(), "1");
    }
}
