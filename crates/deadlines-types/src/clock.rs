use chrono::{DateTime, Local, TimeZone};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of "now". Storage predicates and level math read time only through this.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Local midnight at the start of the current day, in epoch milliseconds.
    fn today_midnight_millis(&self) -> i64 {
        local_midnight(self.now()).timestamp_millis()
    }
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at one instant, for tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    /// `None` when `ms` is outside the representable range.
    pub fn at_millis(ms: i64) -> Option<Self> {
        Local.timestamp_millis_opt(ms).single().map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

fn local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let naive = now.date_naive().and_time(chrono::NaiveTime::MIN);
    // A DST transition can skip midnight; fall back to `now` rather than guess.
    Local.from_local_datetime(&naive).earliest().unwrap_or(now)
}
