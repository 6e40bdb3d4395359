//! Deadline query engine: resource routing, archived/active partitioning,
//! urgency counts, and the line-oriented backup format.

pub mod backup;
pub mod counts;
pub mod error;
pub mod http;
pub mod notify;
pub mod provider;

pub use error::{Error, Result};
pub use notify::{ChangeSink, Dispatcher};
pub use provider::{DefaultGroup, Provider, Query, QueryResult};
