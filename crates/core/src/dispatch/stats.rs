//! Queue statistics.

use std::collections::{BTreeMap, HashMap};

use super::dispatcher::company_code_of;
use super::{CompanyCount, ServiceCount, Statistics};
use crate::model::TicketStatus;
use crate::store::{StoreError, StoreTx, TicketFilter};

/// Aggregate ticket counts and the average frozen estimate.
///
/// The average is taken over every DONE ticket's estimate at registration,
/// not over observed service times. A `-1` estimate counts as its value.
pub fn compute_statistics(
    tx: &dyn StoreTx,
    company_code_length: usize,
) -> Result<Statistics, StoreError> {
    let count = |status: TicketStatus| {
        tx.count_tickets(&TicketFilter::new().with_statuses(&[status]))
    };
    let waiting = count(TicketStatus::Waiting)?;
    let called = count(TicketStatus::Called)?;
    let done = count(TicketStatus::Done)?;

    let done_tickets = tx.list_tickets(&TicketFilter::new().with_statuses(&[TicketStatus::Done]))?;
    let estimates: Vec<i64> = done_tickets
        .iter()
        .map(|t| t.estimated_waiting_time_minutes)
        .collect();
    let average_wait_time_minutes = if estimates.is_empty() {
        None
    } else {
        Some(estimates.iter().sum::<i64>() as f64 / estimates.len() as f64)
    };

    let active = tx.list_tickets(&TicketFilter::new().active())?;

    let mut per_company: BTreeMap<String, i64> = BTreeMap::new();
    let mut per_service: BTreeMap<i64, i64> = BTreeMap::new();
    for ticket in &active {
        let code = company_code_of(&ticket.ticket_number, company_code_length)
            .unwrap_or_else(|| ticket.ticket_number.trim().to_uppercase());
        *per_company.entry(code).or_default() += 1;
        *per_service.entry(ticket.service_id).or_default() += 1;
    }

    let mut by_company = Vec::with_capacity(per_company.len());
    for (code, count) in per_company {
        let name = tx.company_by_code(&code)?.map(|c| c.name);
        by_company.push(CompanyCount { code, name, count });
    }

    let services: HashMap<i64, _> = tx
        .list_services()?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let by_service = per_service
        .into_iter()
        .filter_map(|(service_id, count)| {
            services.get(&service_id).map(|s| ServiceCount {
                service_id,
                name: s.name.clone(),
                prefix: s.prefix,
                count,
            })
        })
        .collect();

    Ok(Statistics {
        total_active: waiting + called,
        waiting,
        called,
        done,
        average_wait_time_minutes,
        by_company,
        by_service,
    })
}
