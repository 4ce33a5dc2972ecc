//! Queue tickets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CounterName, UnknownToken};

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Waiting,
    Called,
    Done,
    /// Reserved for administrative cancellation; no staff action produces it.
    Cancelled,
}

impl TicketStatus {
    /// Statuses that count as load against a counter.
    pub const ACTIVE: [TicketStatus; 2] = [TicketStatus::Waiting, TicketStatus::Called];

    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Waiting,
        TicketStatus::Called,
        TicketStatus::Done,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "WAITING",
            TicketStatus::Called => "CALLED",
            TicketStatus::Done => "DONE",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Waiting | TicketStatus::Called)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Done | TicketStatus::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(TicketStatus::Waiting),
            "CALLED" => Ok(TicketStatus::Called),
            "DONE" => Ok(TicketStatus::Done),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            other => Err(UnknownToken {
                kind: "ticket status",
                token: other.to_string(),
            }),
        }
    }
}

/// A traveler's place in a service queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    /// The traveler-supplied flight number. Shared by everyone on the flight.
    pub ticket_number: String,
    /// `<service prefix><3-digit daily sequence>`, e.g. "C007".
    pub queue_number: String,
    pub service_id: i64,
    /// Bound once by counter assignment, never rebound.
    pub counter: Option<CounterName>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    /// Frozen at creation. `-1` means no open counter could serve it.
    pub estimated_waiting_time_minutes: i64,
}

/// Fields for inserting a ticket. Tickets always start WAITING and unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub ticket_number: String,
    pub queue_number: String,
    pub service_id: i64,
    pub created_at: DateTime<Utc>,
    pub estimated_waiting_time_minutes: i64,
}
