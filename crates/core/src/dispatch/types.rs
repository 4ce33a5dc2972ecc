//! Types for the dispatch engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Counter, CounterName, Ticket, TicketStatus};
use crate::store::StoreError;

/// Errors surfaced by dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A service, company, counter, flight or ticket lookup missed.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The flight number is not in the flight table.
    #[error("flight {flight_number} is not scheduled")]
    NotScheduled { flight_number: String },

    /// A lifecycle action was attempted from the wrong status.
    #[error("cannot {action} ticket {ticket_id}: ticket is {current}")]
    InvalidTransition {
        ticket_id: i64,
        current: TicketStatus,
        action: TicketAction,
    },

    #[error("unknown ticket action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub(crate) fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        DispatchError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable tag for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::NotScheduled { .. } => "not_scheduled",
            DispatchError::InvalidTransition { .. } => "invalid_transition",
            DispatchError::UnknownAction(_) => "unknown_action",
            DispatchError::Store(_) => "store",
        }
    }
}

/// A staff action on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketAction {
    Call,
    Serve,
    Skip,
}

impl TicketAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketAction::Call => "call",
            TicketAction::Serve => "serve",
            TicketAction::Skip => "skip",
        }
    }
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketAction {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(TicketAction::Call),
            "serve" => Ok(TicketAction::Serve),
            "skip" => Ok(TicketAction::Skip),
            _ => Err(DispatchError::UnknownAction(s.to_string())),
        }
    }
}

/// Outcome of counter assignment. Finding no open counter is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Assigned(Counter),
    NoCounterAvailable,
}

impl Assignment {
    pub fn counter(&self) -> Option<&Counter> {
        match self {
            Assignment::Assigned(counter) => Some(counter),
            Assignment::NoCounterAvailable => None,
        }
    }
}

/// Result of registering a traveler.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub ticket_id: i64,
    pub queue_number: String,
    /// `-1` when the company had no open counter.
    pub estimated_waiting_time_minutes: i64,
    pub counter: Option<CounterName>,
    pub company_name: String,
    /// Set when the ticket was created but counter assignment failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_error: Option<String>,
    pub ticket: Ticket,
}

/// A counter together with its live load.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CounterLoad {
    #[serde(flatten)]
    pub counter: Counter,
    /// Active tickets currently bound to the counter.
    pub load: i64,
}

/// Active tickets attributed to one company.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompanyCount {
    pub code: String,
    /// Absent when the prefix matches no known company.
    pub name: Option<String>,
    pub count: i64,
}

/// Active tickets in one service queue.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceCount {
    pub service_id: i64,
    pub name: String,
    pub prefix: char,
    pub count: i64,
}

/// Queue statistics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    /// WAITING plus CALLED.
    pub total_active: i64,
    pub waiting: i64,
    pub called: i64,
    pub done: i64,
    /// Mean frozen estimate over DONE tickets, `-1` included.
    pub average_wait_time_minutes: Option<f64>,
    pub by_company: Vec<CompanyCount>,
    pub by_service: Vec<ServiceCount>,
}
