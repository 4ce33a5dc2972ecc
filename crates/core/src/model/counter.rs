//! Counters: the closed set of physical service positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UnknownToken;

/// Zone letters of the terminal hall.
pub const COUNTER_ZONES: [char; 2] = ['A', 'B'];

/// Counter slots per zone, numbered from 1.
pub const SLOTS_PER_ZONE: u8 = 12;

/// Name of a counter from the fixed universe `A1..A12, B1..B12`.
///
/// Ordering is plain lexicographic on the name ("A10" sorts before "A2"),
/// which is the tie-break order used by counter assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterName(String);

/// Error for names outside the closed counter set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid counter name: {0}")]
pub struct InvalidCounterName(pub String);

impl CounterName {
    /// Parse a counter name, accepting lowercase zone letters.
    pub fn parse(raw: &str) -> Result<Self, InvalidCounterName> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        let zone = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| COUNTER_ZONES.contains(c))
            .ok_or_else(|| InvalidCounterName(raw.to_string()))?;

        let digits = chars.as_str();
        // Reject "A01" and "A+1": the slot must be written canonically.
        if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidCounterName(raw.to_string()));
        }
        let slot: u8 = digits
            .parse()
            .map_err(|_| InvalidCounterName(raw.to_string()))?;
        if slot == 0 || slot > SLOTS_PER_ZONE {
            return Err(InvalidCounterName(raw.to_string()));
        }

        Ok(Self(format!("{}{}", zone, slot)))
    }

    /// Every counter in the universe, zone by zone, slot by slot.
    pub fn all() -> impl Iterator<Item = CounterName> {
        COUNTER_ZONES.into_iter().flat_map(|zone| {
            (1..=SLOTS_PER_ZONE).map(move |slot| CounterName(format!("{}{}", zone, slot)))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CounterName {
    type Err = InvalidCounterName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CounterName {
    type Error = InvalidCounterName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CounterName> for String {
    fn from(name: CounterName) -> Self {
        name.0
    }
}

/// Occupancy status of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterStatus {
    /// Open, no active ticket.
    Libre,
    /// Open, serving or holding active tickets.
    Occupe,
    /// Closed. Never selected by assignment.
    Ferme,
}

impl CounterStatus {
    /// Statuses a counter can receive new tickets in.
    pub const OPEN: [CounterStatus; 2] = [CounterStatus::Libre, CounterStatus::Occupe];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterStatus::Libre => "LIBRE",
            CounterStatus::Occupe => "OCCUPE",
            CounterStatus::Ferme => "FERME",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, CounterStatus::Ferme)
    }
}

impl fmt::Display for CounterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterStatus {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIBRE" => Ok(CounterStatus::Libre),
            "OCCUPE" => Ok(CounterStatus::Occupe),
            "FERME" => Ok(CounterStatus::Ferme),
            other => Err(UnknownToken {
                kind: "counter status",
                token: other.to_string(),
            }),
        }
    }
}

/// A counter row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counter {
    pub name: CounterName,
    /// Code of the company routed to this counter, if any.
    pub assigned_company: Option<String>,
    pub status: CounterStatus,
}
