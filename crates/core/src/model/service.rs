use serde::{Deserialize, Serialize};

/// A queue service (e.g. "Check-in & baggage"). Each service owns its own
/// daily numbering sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub id: i64,
    pub name: String,
    /// Single character prepended to queue numbers.
    pub prefix: char,
    pub is_active: bool,
}

/// Service fields used for upserts (keyed on `name`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewService {
    pub name: String,
    pub prefix: char,
    pub is_active: bool,
}

impl NewService {
    pub fn new(name: impl Into<String>, prefix: char) -> Self {
        Self {
            name: name.into(),
            prefix,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
