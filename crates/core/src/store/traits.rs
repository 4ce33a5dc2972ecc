//! Data store trait and query types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Company, Counter, CounterName, CounterStatus, Flight, NewCompany, NewFlight, NewService,
    NewTicket, Service, Ticket, TicketStatus,
};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A write referenced a row that doesn't exist or violated a constraint.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
                StoreError::Corrupt(inner.to_string())
            }
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.unwrap_or_else(|| err.to_string()))
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Filter for querying tickets.
///
/// Results are always ordered FIFO: `created_at` ascending, then id.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub service_id: Option<i64>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub counter: Option<CounterName>,
    /// Empty means any status.
    pub statuses: Vec<TicketStatus>,
    /// Exact, case-insensitive flight number match.
    pub ticket_number: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service_id: i64) -> Self {
        self.service_id = Some(service_id);
        self
    }

    /// Restrict to `[from, before)`.
    pub fn created_between(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_before = Some(before);
        self
    }

    pub fn created_before(mut self, before: DateTime<Utc>) -> Self {
        self.created_before = Some(before);
        self
    }

    pub fn with_counter(mut self, counter: CounterName) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn with_statuses(mut self, statuses: &[TicketStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Shorthand for WAITING or CALLED.
    pub fn active(self) -> Self {
        self.with_statuses(&TicketStatus::ACTIVE)
    }

    pub fn with_ticket_number(mut self, ticket_number: impl Into<String>) -> Self {
        self.ticket_number = Some(ticket_number.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Filter for querying counters. Results are ordered by name.
#[derive(Debug, Clone, Default)]
pub struct CounterFilter {
    /// Case-insensitive company code.
    pub company_code: Option<String>,
    /// Empty means any status.
    pub statuses: Vec<CounterStatus>,
}

impl CounterFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_company(mut self, code: impl Into<String>) -> Self {
        self.company_code = Some(code.into());
        self
    }

    pub fn with_statuses(mut self, statuses: &[CounterStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Shorthand for LIBRE or OCCUPE.
    pub fn open(self) -> Self {
        self.with_statuses(&CounterStatus::OPEN)
    }
}

/// Storage backend for the dispatch engine.
pub trait QueueStore: Send + Sync {
    /// Start a unit of work.
    ///
    /// Units of work are serialized against each other. A transaction that is
    /// dropped without [`StoreTx::commit`] is rolled back.
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError>;
}

/// Operations available inside a unit of work.
pub trait StoreTx {
    // Companies

    /// Insert a company or update the one with the same code.
    fn upsert_company(&self, company: &NewCompany) -> Result<Company, StoreError>;

    /// Case-insensitive lookup by code.
    fn company_by_code(&self, code: &str) -> Result<Option<Company>, StoreError>;

    fn list_companies(&self) -> Result<Vec<Company>, StoreError>;

    // Services

    /// Insert a service or update the one with the same name.
    fn upsert_service(&self, service: &NewService) -> Result<Service, StoreError>;

    fn service(&self, id: i64) -> Result<Option<Service>, StoreError>;

    fn list_services(&self) -> Result<Vec<Service>, StoreError>;

    // Flights

    /// Insert a flight or update the one with the same number.
    fn upsert_flight(&self, flight: &NewFlight) -> Result<Flight, StoreError>;

    /// Case-insensitive lookup by flight number.
    fn flight_by_number(&self, flight_number: &str) -> Result<Option<Flight>, StoreError>;

    fn list_flights(&self) -> Result<Vec<Flight>, StoreError>;

    // Counters

    fn counter(&self, name: &CounterName) -> Result<Option<Counter>, StoreError>;

    fn list_counters(&self, filter: &CounterFilter) -> Result<Vec<Counter>, StoreError>;

    fn count_counters(&self, filter: &CounterFilter) -> Result<i64, StoreError>;

    /// Route a counter to a company, or unassign it with `None`.
    fn set_counter_company(
        &self,
        name: &CounterName,
        company_code: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Set the status only if it currently equals `expected`.
    /// Returns whether the update happened.
    fn compare_and_set_counter_status(
        &self,
        name: &CounterName,
        expected: CounterStatus,
        new: CounterStatus,
    ) -> Result<bool, StoreError>;

    // Tickets

    fn insert_ticket(&self, ticket: &NewTicket) -> Result<Ticket, StoreError>;

    fn ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError>;

    fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError>;

    fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, StoreError>;

    /// Set a ticket's status and, when given, its `called_at`.
    fn update_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        called_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Bind a ticket to a counter. Returns false if the ticket is already
    /// bound to a different counter (bindings are never rewritten).
    fn bind_ticket_counter(&self, id: i64, counter: &CounterName) -> Result<bool, StoreError>;

    /// Make the unit of work durable.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
