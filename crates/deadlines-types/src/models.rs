use serde::{Deserialize, Serialize};

/// A labeled, due-dated task. `due_date` is milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: i64,
    pub label: String,
    /// `None` means ungrouped.
    pub group: Option<String>,
    pub due_date: i64,
    pub done: bool,
}

impl Deadline {
    /// Done and already past due. Archived status is never stored.
    pub fn is_archived(&self, now_ms: i64) -> bool {
        self.done && self.due_date < now_ms
    }
}

/// A deadline that has not been written yet; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeadline {
    pub label: String,
    #[serde(default)]
    pub group: Option<String>,
    pub due_date: i64,
    #[serde(default)]
    pub done: bool,
}

impl NewDeadline {
    pub fn new(label: impl Into<String>, due_date: i64) -> Self {
        Self {
            label: label.into(),
            group: None,
            due_date,
            done: false,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// True when the group is absent or the empty string.
    pub fn has_no_group(&self) -> bool {
        self.group.as_deref().is_none_or(str::is_empty)
    }
}

impl From<Deadline> for NewDeadline {
    fn from(d: Deadline) -> Self {
        Self {
            label: d.label,
            group: d.group,
            due_date: d.due_date,
            done: d.done,
        }
    }
}

/// Partial update of a deadline. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadlineUpdate {
    #[serde(default)]
    pub label: Option<String>,
    /// `Some("")` resets the group to the configured default.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub done: Option<bool>,
}

impl DeadlineUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.group.is_none() && self.due_date.is_none() && self.done.is_none()
    }
}

/// One distinct group value, carried by the smallest id that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: i64,
    pub group: Option<String>,
}

/// Exclusive per-level counts of not-done deadlines. `Nevermind` is never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub today: u64,
    pub urgent: u64,
    pub worrying: u64,
    pub nice: u64,
}

impl LevelCounts {
    pub fn to_array(self) -> [u64; 4] {
        [self.today, self.urgent, self.worrying, self.nice]
    }

    pub fn from_array(values: [u64; 4]) -> Self {
        let [today, urgent, worrying, nice] = values;
        Self {
            today,
            urgent,
            worrying,
            nice,
        }
    }

    pub fn total(&self) -> u64 {
        self.to_array().iter().sum()
    }
}
