use serde::{Deserialize, Serialize};

/// An airline operating counters and flights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    /// IATA-style code, stored uppercase. Matched case-insensitively.
    pub code: String,
    pub name: String,
    /// Default service duration per traveler.
    pub average_service_time_minutes: u32,
}

/// Company fields used for upserts (keyed on `code`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCompany {
    pub code: String,
    pub name: String,
    pub average_service_time_minutes: u32,
}

impl NewCompany {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        average_service_time_minutes: u32,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            average_service_time_minutes,
        }
    }
}
