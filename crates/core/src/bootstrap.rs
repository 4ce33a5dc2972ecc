//! Apply the configured registry to the store at startup.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::model::{CounterName, InvalidCounterName, NewCompany, NewFlight, NewService};
use crate::store::{QueueStore, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    InvalidCounter(#[from] InvalidCounterName),

    #[error("failed to apply registry: {0}")]
    Store(#[from] StoreError),
}

/// What was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub companies: usize,
    pub services: usize,
    pub flights: usize,
    pub counters: usize,
}

/// Upsert companies, services and flights, then route counters.
///
/// Idempotent: re-running with the same config changes nothing. Runs as a
/// single unit of work, so a failure leaves the store untouched.
pub fn apply_registry(
    store: &dyn QueueStore,
    config: &Config,
) -> Result<BootstrapSummary, BootstrapError> {
    let tx = store.begin()?;
    let mut summary = BootstrapSummary::default();

    for entry in &config.companies {
        tx.upsert_company(&NewCompany::new(
            entry.code.as_str(),
            entry.name.as_str(),
            entry.average_service_time_minutes,
        ))?;
        summary.companies += 1;
    }

    for entry in &config.services {
        let mut service = NewService::new(entry.name.as_str(), entry.prefix);
        if !entry.is_active {
            service = service.inactive();
        }
        tx.upsert_service(&service)?;
        summary.services += 1;
    }

    for entry in &config.flights {
        let mut flight = NewFlight::new(
            entry.flight_number.as_str(),
            entry.company_code.as_str(),
            entry.departure_time,
        );
        flight.status = entry.status.clone();
        tx.upsert_flight(&flight)?;
        summary.flights += 1;
    }

    for entry in &config.counters {
        let name = CounterName::parse(&entry.name)?;
        tx.set_counter_company(&name, entry.company.as_deref())?;

        if let Some(status) = entry.status {
            let current = tx
                .counter(&name)?
                .ok_or_else(|| StoreError::Conflict(format!("counter {} not found", name)))?;
            if current.status != status {
                tx.compare_and_set_counter_status(&name, current.status, status)?;
                debug!(counter = %name, from = %current.status, to = %status, "Counter status set");
            }
        }
        summary.counters += 1;
    }

    tx.commit()?;

    info!(
        companies = summary.companies,
        services = summary.services,
        flights = summary.flights,
        counters = summary.counters,
        "Registry applied"
    );
    Ok(summary)
}
