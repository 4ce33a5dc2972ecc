//! Least-loaded counter assignment.

use tracing::debug;

use super::Assignment;
use crate::model::{Company, Counter, CounterName, CounterStatus, Ticket};
use crate::store::{CounterFilter, StoreError, StoreTx, TicketFilter};

/// Active tickets bound to a counter.
pub fn counter_load(tx: &dyn StoreTx, counter: &CounterName) -> Result<i64, StoreError> {
    tx.count_tickets(&TicketFilter::new().with_counter(counter.clone()).active())
}

/// Pick the counter with the fewest active tickets, lowest name on ties.
pub fn pick_least_loaded(loads: Vec<(Counter, i64)>) -> Option<(Counter, i64)> {
    loads
        .into_iter()
        .min_by(|(a, a_load), (b, b_load)| a_load.cmp(b_load).then_with(|| a.name.cmp(&b.name)))
}

/// Route `ticket` to the least-loaded open counter of `company`.
///
/// Binds the ticket and promotes a LIBRE counter to OCCUPE. An OCCUPE
/// counter is left as is; a counter can hold several active tickets.
pub fn assign_counter(
    tx: &dyn StoreTx,
    company: &Company,
    ticket: &Ticket,
) -> Result<Assignment, StoreError> {
    let open = tx.list_counters(&CounterFilter::new().for_company(&company.code).open())?;
    if open.is_empty() {
        debug!(company = %company.code, "No open counter for company");
        return Ok(Assignment::NoCounterAvailable);
    }

    let mut loads = Vec::with_capacity(open.len());
    for counter in open {
        let load = counter_load(tx, &counter.name)?;
        debug!(counter = %counter.name, load, "Scanned counter load");
        loads.push((counter, load));
    }

    let Some((mut chosen, load)) = pick_least_loaded(loads) else {
        return Ok(Assignment::NoCounterAvailable);
    };

    if !tx.bind_ticket_counter(ticket.id, &chosen.name)? {
        return Err(StoreError::Conflict(format!(
            "ticket {} is already bound to another counter",
            ticket.id
        )));
    }

    if chosen.status == CounterStatus::Libre
        && tx.compare_and_set_counter_status(
            &chosen.name,
            CounterStatus::Libre,
            CounterStatus::Occupe,
        )?
    {
        chosen.status = CounterStatus::Occupe;
    }

    debug!(
        ticket_id = ticket.id,
        counter = %chosen.name,
        prior_load = load,
        "Counter assigned"
    );
    Ok(Assignment::Assigned(chosen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCompany, NewService, NewTicket};
    use crate::store::{QueueStore, SqliteQueueStore};
    use chrono::{Duration, Utc};

    fn counter(name: &str, status: CounterStatus) -> Counter {
        Counter {
            name: CounterName::parse(name).unwrap(),
            assigned_company: Some("AF".to_string()),
            status,
        }
    }

    fn route(tx: &dyn StoreTx, name: &str, company: &str, status: CounterStatus) -> CounterName {
        let name = CounterName::parse(name).unwrap();
        tx.set_counter_company(&name, Some(company)).unwrap();
        if status != CounterStatus::Libre {
            assert!(tx
                .compare_and_set_counter_status(&name, CounterStatus::Libre, status)
                .unwrap());
        }
        name
    }

    fn waiting_ticket(tx: &dyn StoreTx, service_id: i64, seq: i64) -> Ticket {
        tx.insert_ticket(&NewTicket {
            ticket_number: "AF480".to_string(),
            queue_number: format!("C{:03}", seq),
            service_id,
            created_at: Utc::now() + Duration::milliseconds(seq),
            estimated_waiting_time_minutes: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_pick_least_loaded_breaks_ties_by_name() {
        let picked = pick_least_loaded(vec![
            (counter("A2", CounterStatus::Libre), 1),
            (counter("A10", CounterStatus::Occupe), 1),
            (counter("A1", CounterStatus::Occupe), 3),
        ])
        .unwrap();
        assert_eq!(picked.0.name.as_str(), "A10");
        assert_eq!(picked.1, 1);

        assert!(pick_least_loaded(Vec::new()).is_none());
    }

    #[test]
    fn test_routes_to_least_loaded_counter() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let tx = tx.as_ref();
        let company = tx.upsert_company(&NewCompany::new("AF", "Air France", 5)).unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();

        let a1 = route(tx, "A1", "AF", CounterStatus::Libre);
        let a2 = route(tx, "A2", "AF", CounterStatus::Libre);
        let a3 = route(tx, "A3", "AF", CounterStatus::Occupe);

        for (seq, target) in [(1, &a1), (2, &a1), (3, &a3)] {
            let t = waiting_ticket(tx, service.id, seq);
            assert!(tx.bind_ticket_counter(t.id, target).unwrap());
        }

        let ticket = waiting_ticket(tx, service.id, 4);
        let assignment = assign_counter(tx, &company, &ticket).unwrap();

        let chosen = assignment.counter().unwrap();
        assert_eq!(chosen.name, a2);
        assert_eq!(chosen.status, CounterStatus::Occupe);
        assert_eq!(tx.counter(&a2).unwrap().unwrap().status, CounterStatus::Occupe);
        assert_eq!(tx.ticket(ticket.id).unwrap().unwrap().counter, Some(a2));
    }

    #[test]
    fn test_occupied_counter_stays_occupied() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let tx = tx.as_ref();
        let company = tx.upsert_company(&NewCompany::new("AF", "Air France", 5)).unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();
        let b4 = route(tx, "B4", "AF", CounterStatus::Occupe);

        let first = waiting_ticket(tx, service.id, 1);
        let second = waiting_ticket(tx, service.id, 2);
        assign_counter(tx, &company, &first).unwrap();
        let assignment = assign_counter(tx, &company, &second).unwrap();

        assert_eq!(assignment.counter().unwrap().name, b4);
        assert_eq!(tx.counter(&b4).unwrap().unwrap().status, CounterStatus::Occupe);
        assert_eq!(counter_load(tx, &b4).unwrap(), 2);
    }

    #[test]
    fn test_closed_counters_are_never_selected() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let tx = tx.as_ref();
        let company = tx.upsert_company(&NewCompany::new("AF", "Air France", 5)).unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();
        route(tx, "A1", "AF", CounterStatus::Ferme);
        route(tx, "A2", "AF", CounterStatus::Ferme);
        // Open, but routed to another airline.
        route(tx, "A3", "ET", CounterStatus::Libre);

        let ticket = waiting_ticket(tx, service.id, 1);
        let assignment = assign_counter(tx, &company, &ticket).unwrap();

        assert_eq!(assignment, Assignment::NoCounterAvailable);
        assert!(tx.ticket(ticket.id).unwrap().unwrap().counter.is_none());
    }

    #[test]
    fn test_done_tickets_do_not_count_as_load() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let tx = tx.as_ref();
        let company = tx.upsert_company(&NewCompany::new("AF", "Air France", 5)).unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();
        let a1 = route(tx, "A1", "AF", CounterStatus::Libre);
        route(tx, "A2", "AF", CounterStatus::Libre);

        for seq in 1..=3 {
            let t = waiting_ticket(tx, service.id, seq);
            tx.bind_ticket_counter(t.id, &a1).unwrap();
            tx.update_ticket_status(t.id, crate::model::TicketStatus::Done, None)
                .unwrap();
        }

        let ticket = waiting_ticket(tx, service.id, 4);
        let assignment = assign_counter(tx, &company, &ticket).unwrap();
        assert_eq!(assignment.counter().unwrap().name, a1);
    }
}
