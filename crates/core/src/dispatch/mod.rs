//! Dispatch engine: queue numbering, counter routing, wait estimation and
//! the ticket lifecycle.
//!
//! Every operation runs inside a store unit of work. The engine itself keeps
//! no state between calls.

mod assignment;
mod config;
mod dispatcher;
mod estimator;
mod lifecycle;
mod numbering;
mod stats;
mod types;

pub use assignment::{assign_counter, counter_load, pick_least_loaded};
pub use config::{DayBoundary, DispatchConfig};
pub use dispatcher::{company_code_of, Dispatcher};
pub use estimator::{estimate_wait_minutes, wait_minutes, NO_ESTIMATE};
pub use lifecycle::{apply as apply_transition, plan as plan_transition, Transition};
pub use numbering::{format_queue_number, next_queue_number};
pub use stats::compute_statistics;
pub use types::{
    Assignment, CompanyCount, CounterLoad, DispatchError, Registration, ServiceCount, Statistics,
    TicketAction,
};
