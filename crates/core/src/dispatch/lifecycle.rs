//! Ticket state machine and its counter side effects.
//!
//! | action | from    | to      | bound counter |
//! |--------|---------|---------|---------------|
//! | call   | WAITING | CALLED  | OCCUPE        |
//! | serve  | CALLED  | DONE    | LIBRE         |
//! | skip   | CALLED  | WAITING | LIBRE         |
//!
//! A closed (FERME) counter is never reopened by a ticket transition.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{DispatchError, TicketAction};
use crate::metrics::{INVALID_TRANSITIONS, TICKET_TRANSITIONS};
use crate::model::{CounterName, CounterStatus, Ticket, TicketStatus};
use crate::store::{StoreError, StoreTx};

/// A validated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: TicketAction,
    pub from: TicketStatus,
    pub to: TicketStatus,
    /// Status the bound counter moves to.
    pub counter_status: CounterStatus,
}

impl TicketAction {
    /// `(required status, resulting status, counter status)`.
    fn rule(self) -> (TicketStatus, TicketStatus, CounterStatus) {
        match self {
            TicketAction::Call => (TicketStatus::Waiting, TicketStatus::Called, CounterStatus::Occupe),
            TicketAction::Serve => (TicketStatus::Called, TicketStatus::Done, CounterStatus::Libre),
            TicketAction::Skip => (TicketStatus::Called, TicketStatus::Waiting, CounterStatus::Libre),
        }
    }
}

/// Check that `action` is allowed from the ticket's current status.
pub fn plan(ticket: &Ticket, action: TicketAction) -> Result<Transition, DispatchError> {
    let (required, to, counter_status) = action.rule();
    if ticket.status != required {
        return Err(DispatchError::InvalidTransition {
            ticket_id: ticket.id,
            current: ticket.status,
            action,
        });
    }
    Ok(Transition {
        action,
        from: ticket.status,
        to,
        counter_status,
    })
}

/// Apply `action` to `ticket` and its bound counter within `tx`.
///
/// On error nothing has been written; the caller drops the unit of work.
pub fn apply(
    tx: &dyn StoreTx,
    ticket: &Ticket,
    action: TicketAction,
    now: DateTime<Utc>,
) -> Result<Ticket, DispatchError> {
    let transition = match plan(ticket, action) {
        Ok(t) => t,
        Err(e) => {
            INVALID_TRANSITIONS
                .with_label_values(&[action.as_str()])
                .inc();
            return Err(e);
        }
    };

    // called_at is restamped on every call, including after a skip.
    let called_at = (action == TicketAction::Call).then_some(now);
    tx.update_ticket_status(ticket.id, transition.to, called_at)?;

    if let Some(ref counter) = ticket.counter {
        set_counter_status_unless_closed(tx, counter, transition.counter_status)?;
    }

    TICKET_TRANSITIONS
        .with_label_values(&[transition.from.as_str(), transition.to.as_str()])
        .inc();
    info!(
        ticket_id = ticket.id,
        action = %action,
        from = %transition.from,
        to = %transition.to,
        counter = ticket.counter.as_ref().map(|c| c.as_str()),
        "Ticket transitioned"
    );

    tx.ticket(ticket.id)?
        .ok_or_else(|| DispatchError::not_found("ticket", ticket.id))
}

/// Move an open counter to `target`. FERME counters are left alone.
pub fn set_counter_status_unless_closed(
    tx: &dyn StoreTx,
    name: &CounterName,
    target: CounterStatus,
) -> Result<(), StoreError> {
    let Some(counter) = tx.counter(name)? else {
        return Err(StoreError::Conflict(format!("counter {} not found", name)));
    };
    if counter.status == CounterStatus::Ferme || counter.status == target {
        debug!(counter = %name, status = %counter.status, "Counter status unchanged");
        return Ok(());
    }
    if !tx.compare_and_set_counter_status(name, counter.status, target)? {
        return Err(StoreError::Conflict(format!(
            "counter {} changed status concurrently",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewService, NewTicket};
    use crate::store::{QueueStore, SqliteQueueStore};

    fn ticket_with(status: TicketStatus) -> Ticket {
        Ticket {
            id: 1,
            ticket_number: "AF480".to_string(),
            queue_number: "C001".to_string(),
            service_id: 1,
            counter: None,
            status,
            created_at: Utc::now(),
            called_at: None,
            estimated_waiting_time_minutes: 0,
        }
    }

    fn bound_ticket(tx: &dyn StoreTx, counter: &CounterName) -> Ticket {
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();
        let ticket = tx
            .insert_ticket(&NewTicket {
                ticket_number: "AF480".to_string(),
                queue_number: "C001".to_string(),
                service_id: service.id,
                created_at: Utc::now(),
                estimated_waiting_time_minutes: 0,
            })
            .unwrap();
        assert!(tx.bind_ticket_counter(ticket.id, counter).unwrap());
        tx.ticket(ticket.id).unwrap().unwrap()
    }

    #[test]
    fn test_plan_table() {
        let cases = [
            (TicketStatus::Waiting, TicketAction::Call, Some(TicketStatus::Called)),
            (TicketStatus::Called, TicketAction::Serve, Some(TicketStatus::Done)),
            (TicketStatus::Called, TicketAction::Skip, Some(TicketStatus::Waiting)),
            (TicketStatus::Waiting, TicketAction::Serve, None),
            (TicketStatus::Waiting, TicketAction::Skip, None),
            (TicketStatus::Called, TicketAction::Call, None),
            (TicketStatus::Done, TicketAction::Call, None),
            (TicketStatus::Done, TicketAction::Serve, None),
            (TicketStatus::Cancelled, TicketAction::Call, None),
            (TicketStatus::Cancelled, TicketAction::Skip, None),
        ];

        for (status, action, expected) in cases {
            let result = plan(&ticket_with(status), action);
            match expected {
                Some(to) => assert_eq!(result.unwrap().to, to, "{status} {action}"),
                None => assert!(
                    matches!(
                        result,
                        Err(DispatchError::InvalidTransition { current, action: a, .. })
                            if current == status && a == action
                    ),
                    "{status} {action} should be rejected"
                ),
            }
        }
    }

    #[test]
    fn test_call_serve_drives_counter() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let a1 = CounterName::parse("A1").unwrap();
        let ticket = bound_ticket(tx.as_ref(), &a1);

        let now = Utc::now();
        let called = apply(tx.as_ref(), &ticket, TicketAction::Call, now).unwrap();
        assert_eq!(called.status, TicketStatus::Called);
        assert!(called.called_at.is_some());
        assert_eq!(tx.counter(&a1).unwrap().unwrap().status, CounterStatus::Occupe);

        let served = apply(tx.as_ref(), &called, TicketAction::Serve, Utc::now()).unwrap();
        assert_eq!(served.status, TicketStatus::Done);
        assert_eq!(served.called_at, called.called_at);
        assert_eq!(tx.counter(&a1).unwrap().unwrap().status, CounterStatus::Libre);
    }

    #[test]
    fn test_skip_returns_ticket_to_queue_and_frees_counter() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let b2 = CounterName::parse("B2").unwrap();
        let ticket = bound_ticket(tx.as_ref(), &b2);

        let called = apply(tx.as_ref(), &ticket, TicketAction::Call, Utc::now()).unwrap();
        let skipped = apply(tx.as_ref(), &called, TicketAction::Skip, Utc::now()).unwrap();
        assert_eq!(skipped.status, TicketStatus::Waiting);
        assert_eq!(skipped.counter, Some(b2.clone()));
        assert_eq!(tx.counter(&b2).unwrap().unwrap().status, CounterStatus::Libre);
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let a5 = CounterName::parse("A5").unwrap();
        tx.compare_and_set_counter_status(&a5, CounterStatus::Libre, CounterStatus::Occupe)
            .unwrap();
        let ticket = bound_ticket(tx.as_ref(), &a5);

        let result = apply(tx.as_ref(), &ticket, TicketAction::Serve, Utc::now());
        assert!(matches!(
            result,
            Err(DispatchError::InvalidTransition {
                current: TicketStatus::Waiting,
                action: TicketAction::Serve,
                ..
            })
        ));
        assert_eq!(
            tx.ticket(ticket.id).unwrap().unwrap().status,
            TicketStatus::Waiting
        );
        assert_eq!(tx.counter(&a5).unwrap().unwrap().status, CounterStatus::Occupe);
    }

    #[test]
    fn test_closed_counter_is_not_reopened() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let a7 = CounterName::parse("A7").unwrap();
        let ticket = bound_ticket(tx.as_ref(), &a7);
        tx.compare_and_set_counter_status(&a7, CounterStatus::Libre, CounterStatus::Ferme)
            .unwrap();

        let called = apply(tx.as_ref(), &ticket, TicketAction::Call, Utc::now()).unwrap();
        assert_eq!(called.status, TicketStatus::Called);
        assert_eq!(tx.counter(&a7).unwrap().unwrap().status, CounterStatus::Ferme);
    }

    #[test]
    fn test_unbound_ticket_transitions_normally() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();
        let ticket = tx
            .insert_ticket(&NewTicket {
                ticket_number: "ET901".to_string(),
                queue_number: "C001".to_string(),
                service_id: service.id,
                created_at: Utc::now(),
                estimated_waiting_time_minutes: -1,
            })
            .unwrap();

        let called = apply(tx.as_ref(), &ticket, TicketAction::Call, Utc::now()).unwrap();
        assert_eq!(called.status, TicketStatus::Called);
        assert!(called.counter.is_none());
    }
}
