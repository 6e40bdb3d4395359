pub mod clock;
pub mod events;
pub mod level;
pub mod models;
pub mod route;

pub use clock::{Clock, DAY_MS, FixedClock, SystemClock};
pub use level::{Level, classify};
pub use events::ChangeEvent;
pub use models::{Deadline, DeadlineUpdate, GroupRow, LevelCounts, NewDeadline};
pub use route::{Partition, Route, RouteError};
