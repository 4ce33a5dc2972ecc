//! Domain records: companies, services, counters, flights and tickets.

mod company;
mod counter;
mod flight;
mod service;
mod ticket;

pub use company::{Company, NewCompany};
pub use counter::{
    Counter, CounterName, CounterStatus, InvalidCounterName, COUNTER_ZONES, SLOTS_PER_ZONE,
};
pub use flight::{Flight, NewFlight};
pub use service::{NewService, Service};
pub use ticket::{NewTicket, Ticket, TicketStatus};

use std::fmt;

/// Raised when a persisted enumeration token is not one we know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken {
    pub kind: &'static str,
    pub token: String,
}

impl fmt::Display for UnknownToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} token: {}", self.kind, self.token)
    }
}

impl std::error::Error for UnknownToken {}
