use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use deadlines_db::predicate::{group_is, id_is, partition};
use deadlines_db::{Cell, Column, Database, DbError, Filter, Predicate, Sort};
use deadlines_types::clock::{Clock, DAY_MS, SystemClock};
use deadlines_types::route::ROOT;
use deadlines_types::{
    Deadline, DeadlineUpdate, GroupRow, LevelCounts, NewDeadline, Partition, Route,
};

use crate::error::{Error, Operation, Result};
use crate::notify::ChangeSink;

/// Supplies the group written when a deadline arrives without one.
pub trait DefaultGroup: Send + Sync {
    fn default_group(&self) -> String;
}

impl DefaultGroup for String {
    fn default_group(&self) -> String {
        self.clone()
    }
}

impl DefaultGroup for &'static str {
    fn default_group(&self) -> String {
        (*self).to_string()
    }
}

/// Optional narrowing, projection and ordering for a read.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// `Some` switches the result to [`QueryResult::Columns`].
    pub columns: Option<Vec<Column>>,
    pub filter: Option<Filter>,
    pub sort: Vec<Sort>,
}

impl Query {
    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn filtered(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn projected(mut self, columns: Vec<Column>) -> Self {
        self.columns = Some(columns);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryResult {
    Deadlines(Vec<Deadline>),
    Columns {
        columns: Vec<Column>,
        rows: Vec<Vec<Cell>>,
    },
    Groups(Vec<GroupRow>),
    Counts(LevelCounts),
}

impl QueryResult {
    pub fn into_deadlines(self) -> Option<Vec<Deadline>> {
        match self {
            QueryResult::Deadlines(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_groups(self) -> Option<Vec<GroupRow>> {
        match self {
            QueryResult::Groups(g) => Some(g),
            _ => None,
        }
    }

    pub fn into_counts(self) -> Option<LevelCounts> {
        match self {
            QueryResult::Counts(c) => Some(c),
            _ => None,
        }
    }
}

/// Not-done deadlines due no later than one day past today's midnight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueSoon {
    pub total: u64,
    pub deadlines: Vec<Deadline>,
}

/// The query engine over the deadline table.
pub struct Provider {
    db: Database,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ChangeSink>,
    default_group: Arc<dyn DefaultGroup>,
}

impl Provider {
    pub fn new(db: Database, sink: Arc<dyn ChangeSink>, default_group: Arc<dyn DefaultGroup>) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            sink,
            default_group,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Parses `path` and runs it.
    pub fn query(&self, path: &str, query: &Query) -> Result<QueryResult> {
        let route = Route::parse(path)?;
        self.execute(&route, query)
    }

    pub fn execute(&self, route: &Route, query: &Query) -> Result<QueryResult> {
        debug!(route = %route, "Executing query");
        if let Route::Count = route {
            return Ok(QueryResult::Counts(self.counts_by_level()?));
        }

        let mut predicate = self.route_predicate(route);
        if let Some(filter) = &query.filter {
            predicate = predicate.and_predicate(filter.to_predicate());
        }

        if route.is_group_listing() {
            return Ok(QueryResult::Groups(self.db.select_groups(&predicate, &query.sort)?));
        }
        match &query.columns {
            Some(columns) => {
                let columns = if columns.is_empty() {
                    Column::ALL.to_vec()
                } else {
                    columns.clone()
                };
                let rows = self.db.select_columns(&predicate, &columns, &query.sort)?;
                Ok(QueryResult::Columns { columns, rows })
            }
            None => Ok(QueryResult::Deadlines(
                self.db.select_deadlines(&predicate, &query.sort)?,
            )),
        }
    }

    /// The route's own predicate: by-id and all-groups ignore the archived
    /// split, every other list route applies it.
    pub fn route_predicate(&self, route: &Route) -> Predicate {
        self.route_predicate_at(route, self.clock.now_millis())
    }

    /// [`Provider::route_predicate`] with the archived split evaluated at `now`.
    pub fn route_predicate_at(&self, route: &Route, now: i64) -> Predicate {
        if let Route::Deadline(id) = route {
            return id_is(*id);
        }
        let mut predicate = match route.partition() {
            Some(p) => partition(now, p == Partition::Archived),
            None => Predicate::all(),
        };
        if let Some(group) = route.group() {
            predicate = predicate.and_predicate(group_is(group));
        }
        predicate
    }

    /// Inserts through `deadlines`, substituting the default group when none
    /// is given. Returns the new id.
    pub fn insert(&self, route: &Route, mut new: NewDeadline) -> Result<i64> {
        Operation::Insert.check(route)?;
        if new.has_no_group() {
            new.group = Some(self.default_group.default_group());
        }

        let id = self.db.insert_deadline(&new).map_err(|e| match e {
            DbError::Constraint(reason) => Error::InsertFailed(reason),
            other => Error::Storage(other),
        })?;

        info!(id, label = %new.label, "Deadline created");
        self.sink.notify_change(ROOT);
        Ok(id)
    }

    /// Updates through `deadlines/{id}`. A missing id affects 0 rows.
    pub fn update(&self, route: &Route, mut changes: DeadlineUpdate) -> Result<usize> {
        let Route::Deadline(id) = route else {
            return Err(Operation::Update.rejected(route));
        };
        if changes.group.as_deref() == Some("") {
            changes.group = Some(self.default_group.default_group());
        }

        let affected = self.db.update_deadline(*id, &changes)?;
        debug!(id, affected, "Deadline updated");
        if !changes.is_empty() {
            self.sink.notify_change(ROOT);
        }
        Ok(affected)
    }

    /// Deletes through `deadlines/{id}`. A missing id affects 0 rows.
    pub fn delete(&self, route: &Route) -> Result<usize> {
        let Route::Deadline(id) = route else {
            return Err(Operation::Delete.rejected(route));
        };

        let affected = self.db.delete_deadline(*id)?;
        debug!(id, affected, "Deadline deleted");
        self.sink.notify_change(ROOT);
        Ok(affected)
    }

    /// The earliest `limit` not-done deadlines due within the first level
    /// threshold, plus how many there are in total.
    pub fn due_soon(&self, limit: usize) -> Result<DueSoon> {
        let horizon = self.clock.today_midnight_millis() + DAY_MS;
        let filter = Filter::All(vec![Filter::Done(false), Filter::DueOnOrBefore(horizon)]);
        let predicate = filter.to_predicate();

        let mut deadlines = self.db.select_deadlines(&predicate, &[])?;
        let total = deadlines.len() as u64;
        deadlines.truncate(limit);
        Ok(DueSoon { total, deadlines })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use deadlines_types::FixedClock;

    /// Records every notification root.
    #[derive(Default)]
    pub(crate) struct RecordingSink(pub Mutex<Vec<String>>);

    impl RecordingSink {
        pub(crate) fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    impl ChangeSink for RecordingSink {
        fn notify_change(&self, root: &str) {
            self.0.lock().unwrap().push(root.to_string());
        }
    }

    pub(crate) const NOW: i64 = 1_700_000_000_000;

    pub(crate) fn provider() -> (Provider, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let provider = Provider::new(
            Database::open_in_memory().unwrap(),
            sink.clone(),
            Arc::new("Inbox"),
        )
        .with_clock(Arc::new(FixedClock::at_millis(NOW).unwrap()));
        (provider, sink)
    }

    fn labels(result: QueryResult) -> Vec<String> {
        result
            .into_deadlines()
            .unwrap()
            .into_iter()
            .map(|d| d.label)
            .collect()
    }

    #[test]
    fn archived_partition() {
        let (p, _) = provider();
        p.insert(&Route::Deadlines, NewDeadline::new("finished", NOW - DAY_MS).done(true))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("ahead", NOW + DAY_MS).done(true))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("overdue", NOW - DAY_MS))
            .unwrap();

        let active = labels(p.query("deadlines", &Query::default()).unwrap());
        assert_eq!(active, ["overdue", "ahead"]);

        let archived = labels(p.query("deadlines/archived", &Query::default()).unwrap());
        assert_eq!(archived, ["finished"]);
    }

    #[test]
    fn group_routes() {
        let (p, _) = provider();
        for (label, group) in [("one", "A"), ("two", "A"), ("three", "B")] {
            p.insert(&Route::Deadlines, NewDeadline::new(label, NOW + DAY_MS).in_group(group))
                .unwrap();
        }

        let groups: Vec<String> = p
            .query("deadlines/groups", &Query::default())
            .unwrap()
            .into_groups()
            .unwrap()
            .into_iter()
            .filter_map(|g| g.group)
            .collect();
        assert_eq!(groups, ["A", "B"]);

        let in_a = labels(p.query("deadlines/group/A", &Query::default()).unwrap());
        assert_eq!(in_a, ["one", "two"]);

        assert!(p
            .query("deadlines/archived/groups", &Query::default())
            .unwrap()
            .into_groups()
            .unwrap()
            .is_empty());
        assert!(labels(p.query("deadlines/archived/group/A", &Query::default()).unwrap()).is_empty());
    }

    #[test]
    fn all_groups_ignores_partition() {
        let (p, _) = provider();
        p.insert(&Route::Deadlines, NewDeadline::new("old", NOW - DAY_MS).in_group("Past").done(true))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("new", NOW + DAY_MS).in_group("Next"))
            .unwrap();

        let all: Vec<Option<String>> = p
            .execute(&Route::Groups, &Query::default())
            .unwrap()
            .into_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.group)
            .collect();
        assert_eq!(all, [Some("Next".to_string()), Some("Past".to_string())]);

        let archived: Vec<Option<String>> = p
            .execute(&Route::ArchivedGroups, &Query::default())
            .unwrap()
            .into_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.group)
            .collect();
        assert_eq!(archived, [Some("Past".to_string())]);
    }

    #[test]
    fn by_id_searches_whole_table() {
        let (p, _) = provider();
        let id = p
            .insert(&Route::Deadlines, NewDeadline::new("done long ago", 5).done(true))
            .unwrap();
        let found = p
            .execute(&Route::Deadline(id), &Query::default())
            .unwrap()
            .into_deadlines()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[test]
    fn group_with_quotes_is_matched_literally() {
        let (p, _) = provider();
        p.insert(&Route::Deadlines, NewDeadline::new("q", NOW).in_group("it's \"x\""))
            .unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("other", NOW).in_group("y"))
            .unwrap();
        let route = Route::DeadlinesInGroup("it's \"x\"".into());
        assert_eq!(labels(p.execute(&route, &Query::default()).unwrap()), ["q"]);
        let route = Route::DeadlinesInGroup("' OR '1'='1".into());
        assert!(labels(p.execute(&route, &Query::default()).unwrap()).is_empty());
    }

    #[test]
    fn insert_substitutes_default_group() {
        let (p, sink) = provider();
        let id = p.insert(&Route::Deadlines, NewDeadline::new("a", NOW)).unwrap();
        let id2 = p
            .insert(&Route::Deadlines, NewDeadline::new("b", NOW).in_group(""))
            .unwrap();
        for id in [id, id2] {
            let d = p.database().select_deadline(id).unwrap().unwrap();
            assert_eq!(d.group.as_deref(), Some("Inbox"));
        }
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn insert_rejections() {
        let (p, sink) = provider();
        let err = p
            .insert(&Route::Deadline(1), NewDeadline::new("a", NOW))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOperationForRoute {
                operation: Operation::Insert,
                ..
            }
        ));
        let err = p.insert(&Route::Deadlines, NewDeadline::new("", NOW)).unwrap_err();
        assert!(matches!(err, Error::InsertFailed(_)), "{err:?}");
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn writes_only_through_by_id_route() {
        let (p, _) = provider();
        for route in [
            Route::Count,
            Route::Deadlines,
            Route::ArchivedDeadlines,
            Route::DeadlinesInGroup("A".into()),
            Route::Groups,
            Route::ActiveGroups,
        ] {
            assert!(matches!(
                p.delete(&route),
                Err(Error::InvalidOperationForRoute { .. })
            ));
            assert!(matches!(
                p.update(&route, DeadlineUpdate::default()),
                Err(Error::InvalidOperationForRoute { .. })
            ));
        }
    }

    #[test]
    fn update_and_delete_missing_ids_return_zero() {
        let (p, _) = provider();
        let changes = DeadlineUpdate {
            done: Some(true),
            ..Default::default()
        };
        assert_eq!(p.update(&Route::Deadline(404), changes).unwrap(), 0);
        assert_eq!(p.delete(&Route::Deadline(404)).unwrap(), 0);
    }

    #[test]
    fn update_keeps_group_unless_cleared() {
        let (p, sink) = provider();
        let id = p
            .insert(&Route::Deadlines, NewDeadline::new("a", NOW).in_group("Work"))
            .unwrap();
        let route = Route::Deadline(id);

        p.update(
            &route,
            DeadlineUpdate {
                done: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let d = p.database().select_deadline(id).unwrap().unwrap();
        assert_eq!(d.group.as_deref(), Some("Work"));
        assert!(d.done);

        p.update(
            &route,
            DeadlineUpdate {
                group: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        let d = p.database().select_deadline(id).unwrap().unwrap();
        assert_eq!(d.group.as_deref(), Some("Inbox"));

        // insert + two updates; the empty update below writes nothing
        assert_eq!(sink.count(), 3);
        assert_eq!(p.update(&route, DeadlineUpdate::default()).unwrap(), 1);
        assert_eq!(sink.count(), 3);

        assert_eq!(p.delete(&route).unwrap(), 1);
        assert_eq!(sink.count(), 4);
        assert_eq!(sink.0.lock().unwrap()[0], "deadlines");
    }

    #[test]
    fn extra_filter_projection_and_sort() {
        let (p, _) = provider();
        p.insert(&Route::Deadlines, NewDeadline::new("late", NOW + 9 * DAY_MS)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("soon", NOW + DAY_MS)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("mid", NOW + 3 * DAY_MS).done(true))
            .unwrap();

        let q = Query::default().filtered(Filter::Done(false));
        assert_eq!(labels(p.execute(&Route::Deadlines, &q).unwrap()), ["soon", "late"]);

        let q = Query::default().sorted_by(Sort::desc(Column::DueDate));
        assert_eq!(
            labels(p.execute(&Route::Deadlines, &q).unwrap()),
            ["late", "mid", "soon"]
        );

        let q = Query::default()
            .filtered(Filter::DueAfter(NOW + 2 * DAY_MS))
            .projected(vec![Column::Label]);
        let result = p.execute(&Route::Deadlines, &q).unwrap();
        assert_eq!(
            result,
            QueryResult::Columns {
                columns: vec![Column::Label],
                rows: vec![vec![Cell::Text("mid".into())], vec![Cell::Text("late".into())]],
            }
        );
    }

    #[test]
    fn unknown_paths_are_unrecognized() {
        let (p, _) = provider();
        assert!(matches!(
            p.query("deadlines/nope", &Query::default()),
            Err(Error::UnrecognizedRoute(path)) if path == "deadlines/nope"
        ));
    }

    #[test]
    fn due_soon_lists_earliest_not_done() {
        let (p, _) = provider();
        let midnight = p.clock().today_midnight_millis();
        p.insert(&Route::Deadlines, NewDeadline::new("overdue", midnight - DAY_MS)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("today", midnight + 60_000)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("tomorrow", midnight + DAY_MS)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("done", midnight).done(true)).unwrap();
        p.insert(&Route::Deadlines, NewDeadline::new("later", midnight + 3 * DAY_MS)).unwrap();

        let soon = p.due_soon(2).unwrap();
        assert_eq!(soon.total, 3);
        let labels: Vec<&str> = soon.deadlines.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["overdue", "today"]);
    }
}
