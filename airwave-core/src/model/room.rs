use serde::{Deserialize, Serialize};

/// One entry of a `rooms_list` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub count: usize,
}

impl RoomSummary {
    pub fn new(id: impl Into<String>, count: usize) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }
}
