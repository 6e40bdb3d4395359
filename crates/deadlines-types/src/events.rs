use serde::{Deserialize, Serialize};

/// "Something changed under this resource root." Carries no record data;
/// subscribers re-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub root: String,
}

impl ChangeEvent {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}
