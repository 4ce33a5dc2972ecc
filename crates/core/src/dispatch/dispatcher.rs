//! Dispatch orchestrator.
//!
//! Registration runs in two units of work. The first resolves the flight,
//! draws the queue number, freezes the estimate and inserts the ticket. The
//! second assigns a counter. If the second fails, the ticket survives
//! unassigned and the failure is reported on the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::assignment::{assign_counter, counter_load};
use super::estimator::estimate_wait_minutes;
use super::lifecycle;
use super::numbering::next_queue_number;
use super::stats::compute_statistics;
use super::{
    Assignment, CounterLoad, DispatchConfig, DispatchError, Registration, Statistics, TicketAction,
};
use crate::metrics::{COUNTER_ASSIGNMENTS, ESTIMATED_WAIT, REGISTRATIONS_REJECTED, TICKETS_REGISTERED};
use crate::model::{
    Company, Counter, CounterName, CounterStatus, Flight, NewTicket, Service, Ticket, TicketStatus,
};
use crate::store::{CounterFilter, QueueStore, StoreError, StoreTx, TicketFilter};

/// Company code of a flight number: its first `code_length` characters,
/// uppercased. `None` if the flight number is too short.
pub fn company_code_of(flight_number: &str, code_length: usize) -> Option<String> {
    let normalized = flight_number.trim().to_uppercase();
    if code_length == 0 || normalized.chars().count() < code_length {
        return None;
    }
    Some(normalized.chars().take(code_length).collect())
}

/// Entry point for every dispatch operation.
pub struct Dispatcher {
    store: Arc<dyn QueueStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn QueueStore>, config: DispatchConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Issue a ticket for a traveler on `flight_number` in queue `service_id`.
    pub fn register_ticket(
        &self,
        flight_number: &str,
        service_id: i64,
    ) -> Result<Registration, DispatchError> {
        self.register_ticket_at(flight_number, service_id, Utc::now())
    }

    /// [`Self::register_ticket`] with an explicit clock.
    pub fn register_ticket_at(
        &self,
        flight_number: &str,
        service_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Registration, DispatchError> {
        let (ticket, company, service) = self
            .create_ticket(flight_number, service_id, now)
            .inspect_err(|e| {
                let reason = match e {
                    DispatchError::NotFound { entity, .. } => *entity,
                    DispatchError::NotScheduled { .. } => "not_scheduled",
                    _ => "store",
                };
                REGISTRATIONS_REJECTED.with_label_values(&[reason]).inc();
            })?;

        let prefix = service.prefix.to_string();
        TICKETS_REGISTERED
            .with_label_values(&[prefix.as_str()])
            .inc();
        if ticket.estimated_waiting_time_minutes >= 0 {
            ESTIMATED_WAIT
                .with_label_values(&[])
                .observe(ticket.estimated_waiting_time_minutes as f64);
        }

        let (ticket, counter, assignment_error) = match self.assign(&company, &ticket) {
            Ok((bound, Assignment::Assigned(counter))) => {
                COUNTER_ASSIGNMENTS.with_label_values(&["assigned"]).inc();
                (bound, Some(counter.name), None)
            }
            Ok((bound, Assignment::NoCounterAvailable)) => {
                COUNTER_ASSIGNMENTS.with_label_values(&["no_counter"]).inc();
                (bound, None, None)
            }
            Err(e) => {
                COUNTER_ASSIGNMENTS.with_label_values(&["failed"]).inc();
                warn!(
                    ticket_id = ticket.id,
                    company = %company.code,
                    error = %e,
                    "Counter assignment failed, ticket left unassigned"
                );
                (ticket, None, Some(e.to_string()))
            }
        };

        info!(
            ticket_id = ticket.id,
            queue_number = %ticket.queue_number,
            flight = %ticket.ticket_number,
            counter = counter.as_ref().map(|c| c.as_str()),
            estimate = ticket.estimated_waiting_time_minutes,
            "Ticket registered"
        );

        Ok(Registration {
            ticket_id: ticket.id,
            queue_number: ticket.queue_number.clone(),
            estimated_waiting_time_minutes: ticket.estimated_waiting_time_minutes,
            counter,
            company_name: company.name,
            assignment_error,
            ticket,
        })
    }

    fn create_ticket(
        &self,
        flight_number: &str,
        service_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(Ticket, Company, Service), DispatchError> {
        let flight_number = flight_number.trim().to_uppercase();
        let tx = self.store.begin()?;

        let service = match tx.service(service_id)? {
            Some(service) if service.is_active => service,
            _ => return Err(DispatchError::not_found("service", service_id)),
        };

        let code = company_code_of(&flight_number, self.config.company_code_length)
            .ok_or_else(|| DispatchError::not_found("company", &flight_number))?;
        let company = tx
            .company_by_code(&code)?
            .ok_or_else(|| DispatchError::not_found("company", &code))?;

        let flight = tx
            .flight_by_number(&flight_number)?
            .ok_or_else(|| DispatchError::NotScheduled {
                flight_number: flight_number.clone(),
            })?;
        if !flight.company_code.eq_ignore_ascii_case(&company.code) {
            warn!(
                flight = %flight.flight_number,
                operator = %flight.company_code,
                prefix = %company.code,
                "Flight operator differs from flight number prefix"
            );
        }

        let queue_number =
            next_queue_number(tx.as_ref(), &service, self.config.day_boundary(), now)?;
        let estimate = estimate_wait_minutes(tx.as_ref(), &company, &flight_number, now)?;

        let ticket = tx.insert_ticket(&NewTicket {
            ticket_number: flight_number,
            queue_number,
            service_id: service.id,
            created_at: now,
            estimated_waiting_time_minutes: estimate,
        })?;
        tx.commit()?;

        Ok((ticket, company, service))
    }

    fn assign(&self, company: &Company, ticket: &Ticket) -> Result<(Ticket, Assignment), StoreError> {
        let tx = self.store.begin()?;
        let assignment = assign_counter(tx.as_ref(), company, ticket)?;
        let bound = tx
            .ticket(ticket.id)?
            .ok_or_else(|| StoreError::Conflict(format!("ticket {} vanished", ticket.id)))?;
        tx.commit()?;
        Ok((bound, assignment))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Apply a staff action given by name ("call", "serve", "skip").
    pub fn advance_ticket(&self, ticket_id: i64, action: &str) -> Result<Ticket, DispatchError> {
        let action: TicketAction = action.parse()?;
        self.apply_action(ticket_id, action, Utc::now())
    }

    pub fn apply_action(
        &self,
        ticket_id: i64,
        action: TicketAction,
        now: DateTime<Utc>,
    ) -> Result<Ticket, DispatchError> {
        let tx = self.store.begin()?;
        let ticket = tx
            .ticket(ticket_id)?
            .ok_or_else(|| DispatchError::not_found("ticket", ticket_id))?;
        let updated = lifecycle::apply(tx.as_ref(), &ticket, action, now)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Call the oldest waiting ticket bound to a counter, if any.
    pub fn call_next(&self, counter: &str) -> Result<Option<Ticket>, DispatchError> {
        let name = parse_counter(counter)?;
        let tx = self.store.begin()?;
        require_counter(tx.as_ref(), &name)?;

        let next = tx
            .list_tickets(
                &TicketFilter::new()
                    .with_counter(name.clone())
                    .with_statuses(&[TicketStatus::Waiting])
                    .with_limit(1),
            )?
            .into_iter()
            .next();

        let Some(ticket) = next else {
            return Ok(None);
        };
        let called = lifecycle::apply(tx.as_ref(), &ticket, TicketAction::Call, Utc::now())?;
        tx.commit()?;
        Ok(Some(called))
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Reopen a counter, LIBRE or OCCUPE depending on its live load.
    pub fn open_counter(&self, counter: &str) -> Result<CounterLoad, DispatchError> {
        let name = parse_counter(counter)?;
        let tx = self.store.begin()?;
        let current = require_counter(tx.as_ref(), &name)?;
        let load = counter_load(tx.as_ref(), &name)?;
        let target = if load > 0 {
            CounterStatus::Occupe
        } else {
            CounterStatus::Libre
        };

        let updated = set_status(tx.as_ref(), current, target)?;
        tx.commit()?;
        info!(counter = %name, status = %updated.status, load, "Counter opened");
        Ok(CounterLoad {
            counter: updated,
            load,
        })
    }

    /// Close a counter. Bound tickets keep their binding.
    pub fn close_counter(&self, counter: &str) -> Result<CounterLoad, DispatchError> {
        let name = parse_counter(counter)?;
        let tx = self.store.begin()?;
        let current = require_counter(tx.as_ref(), &name)?;
        let load = counter_load(tx.as_ref(), &name)?;

        let updated = set_status(tx.as_ref(), current, CounterStatus::Ferme)?;
        tx.commit()?;
        info!(counter = %name, load, "Counter closed");
        Ok(CounterLoad {
            counter: updated,
            load,
        })
    }

    /// Every counter with its live load, by name.
    pub fn counter_overview(&self) -> Result<Vec<CounterLoad>, DispatchError> {
        let tx = self.store.begin()?;
        let counters = tx.list_counters(&CounterFilter::new())?;

        let mut overview = Vec::with_capacity(counters.len());
        for counter in counters {
            let load = counter_load(tx.as_ref(), &counter.name)?;
            overview.push(CounterLoad { counter, load });
        }
        Ok(overview)
    }

    /// Active tickets bound to a counter, oldest first.
    pub fn counter_queue(&self, counter: &str) -> Result<Vec<Ticket>, DispatchError> {
        let name = parse_counter(counter)?;
        let tx = self.store.begin()?;
        require_counter(tx.as_ref(), &name)?;
        Ok(tx.list_tickets(&TicketFilter::new().with_counter(name).active())?)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn ticket(&self, ticket_id: i64) -> Result<Ticket, DispatchError> {
        let tx = self.store.begin()?;
        tx.ticket(ticket_id)?
            .ok_or_else(|| DispatchError::not_found("ticket", ticket_id))
    }

    /// Every ticket issued for a flight, oldest first.
    pub fn tickets_for_flight(&self, flight_number: &str) -> Result<Vec<Ticket>, DispatchError> {
        let tx = self.store.begin()?;
        Ok(tx.list_tickets(&TicketFilter::new().with_ticket_number(flight_number.trim()))?)
    }

    pub fn list_services(&self) -> Result<Vec<Service>, DispatchError> {
        Ok(self.store.begin()?.list_services()?)
    }

    pub fn list_companies(&self) -> Result<Vec<Company>, DispatchError> {
        Ok(self.store.begin()?.list_companies()?)
    }

    pub fn list_flights(&self) -> Result<Vec<Flight>, DispatchError> {
        Ok(self.store.begin()?.list_flights()?)
    }

    pub fn flight(&self, flight_number: &str) -> Result<Flight, DispatchError> {
        let tx = self.store.begin()?;
        tx.flight_by_number(flight_number)?
            .ok_or_else(|| DispatchError::not_found("flight", flight_number.trim()))
    }

    pub fn statistics(&self) -> Result<Statistics, DispatchError> {
        let tx = self.store.begin()?;
        Ok(compute_statistics(tx.as_ref(), self.config.company_code_length)?)
    }
}

fn parse_counter(raw: &str) -> Result<CounterName, DispatchError> {
    CounterName::parse(raw).map_err(|_| DispatchError::not_found("counter", raw.trim()))
}

fn require_counter(tx: &dyn StoreTx, name: &CounterName) -> Result<Counter, DispatchError> {
    tx.counter(name)?
        .ok_or_else(|| DispatchError::not_found("counter", name))
}

fn set_status(
    tx: &dyn StoreTx,
    mut counter: Counter,
    target: CounterStatus,
) -> Result<Counter, StoreError> {
    if counter.status != target {
        if !tx.compare_and_set_counter_status(&counter.name, counter.status, target)? {
            return Err(StoreError::Conflict(format!(
                "counter {} changed status concurrently",
                counter.name
            )));
        }
        counter.status = target;
    }
    Ok(counter)
}
