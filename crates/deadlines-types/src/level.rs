use serde::{Deserialize, Serialize};

use crate::clock::{Clock, DAY_MS};

/// Urgency of a deadline, from most to least pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Today,
    Urgent,
    Worrying,
    Nice,
    Nevermind,
}

/// Inclusive day thresholds, ascending. Shared by classification and the
/// count aggregator so both agree on bucket edges.
pub const THRESHOLDS: [(i64, Level); 4] = [
    (1, Level::Today),
    (3, Level::Urgent),
    (7, Level::Worrying),
    (15, Level::Nice),
];

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Today,
        Level::Urgent,
        Level::Worrying,
        Level::Nice,
        Level::Nevermind,
    ];

    /// Upper bound in days, or `None` for `Nevermind`.
    pub fn threshold(self) -> Option<i64> {
        THRESHOLDS
            .iter()
            .find(|(_, level)| *level == self)
            .map(|(days, _)| *days)
    }

    /// Level of `due_date` as seen from today's midnight on `clock`.
    pub fn for_due_date(due_date: i64, clock: &dyn Clock) -> Self {
        classify(day_offset(due_date, clock.today_midnight_millis()))
    }
}

/// Maps a day offset (negative when overdue) to its level.
pub fn classify(day_offset: i64) -> Level {
    THRESHOLDS
        .iter()
        .find(|(days, _)| day_offset <= *days)
        .map(|(_, level)| *level)
        .unwrap_or(Level::Nevermind)
}

/// Whole days between today's midnight and the due date, on UTC day boundaries.
pub fn day_offset(due_date: i64, today_midnight: i64) -> i64 {
    due_date.div_euclid(DAY_MS) - today_midnight.div_euclid(DAY_MS)
}
