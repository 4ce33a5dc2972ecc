use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled flight. Only used to validate scanned flight numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flight {
    pub id: i64,
    /// Stored uppercase, matched case-insensitively.
    pub flight_number: String,
    pub company_code: String,
    pub departure_time: DateTime<Utc>,
    /// Free-form operational status (ON_TIME, DELAYED, ...).
    pub status: String,
}

/// Flight fields used for upserts (keyed on `flight_number`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFlight {
    pub flight_number: String,
    pub company_code: String,
    pub departure_time: DateTime<Utc>,
    pub status: String,
}

impl NewFlight {
    pub fn new(
        flight_number: impl Into<String>,
        company_code: impl Into<String>,
        departure_time: DateTime<Utc>,
    ) -> Self {
        Self {
            flight_number: flight_number.into(),
            company_code: company_code.into(),
            departure_time,
            status: "ON_TIME".to_string(),
        }
    }
}
