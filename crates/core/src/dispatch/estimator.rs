//! Wait-time estimation.

use chrono::{DateTime, Utc};

use crate::model::Company;
use crate::store::{CounterFilter, StoreError, StoreTx, TicketFilter};

/// Estimate given when the company has no open counter.
pub const NO_ESTIMATE: i64 = -1;

/// `ceil(ahead / active_counters * avg_service_minutes)`, or [`NO_ESTIMATE`].
///
/// Integer ceiling division; equal to the real-valued ceiling for all inputs.
pub fn wait_minutes(ahead: i64, active_counters: i64, avg_service_minutes: u32) -> i64 {
    if active_counters <= 0 {
        return NO_ESTIMATE;
    }
    let work = ahead.max(0) * i64::from(avg_service_minutes);
    (work + active_counters - 1) / active_counters
}

/// Estimate the wait for a ticket on flight `ticket_number` created at
/// `created_at`, from the queue as it stands in `tx`.
pub fn estimate_wait_minutes(
    tx: &dyn StoreTx,
    company: &Company,
    ticket_number: &str,
    created_at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let active_counters =
        tx.count_counters(&CounterFilter::new().for_company(&company.code).open())?;
    if active_counters == 0 {
        return Ok(NO_ESTIMATE);
    }

    let ahead = tx.count_tickets(
        &TicketFilter::new()
            .with_ticket_number(ticket_number)
            .active()
            .created_before(created_at),
    )?;

    Ok(wait_minutes(
        ahead,
        active_counters,
        company.average_service_time_minutes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CounterName, CounterStatus, NewCompany, NewService, NewTicket, TicketStatus};
    use crate::store::{QueueStore, SqliteQueueStore};
    use chrono::Duration;

    #[test]
    fn test_wait_minutes_formula() {
        assert_eq!(wait_minutes(0, 3, 5), 0);
        assert_eq!(wait_minutes(1, 3, 5), 2); // 1.67 -> 2
        assert_eq!(wait_minutes(3, 3, 5), 5);
        assert_eq!(wait_minutes(4, 3, 5), 7); // 6.67 -> 7
        assert_eq!(wait_minutes(7, 2, 6), 21);
        assert_eq!(wait_minutes(1, 10, 1), 1);
    }

    #[test]
    fn test_wait_minutes_sentinel() {
        assert_eq!(wait_minutes(5, 0, 5), NO_ESTIMATE);
        assert_eq!(wait_minutes(0, 0, 5), NO_ESTIMATE);
    }

    #[test]
    fn test_wait_minutes_matches_real_ceiling() {
        for ahead in 0..40i64 {
            for active in 1..8i64 {
                for avg in 1..12u32 {
                    let expected = ((ahead as f64 / active as f64) * f64::from(avg)).ceil() as i64;
                    let got = wait_minutes(ahead, active, avg);
                    // Float can overshoot by one on exact multiples; never undershoot.
                    assert!(got == expected || got + 1 == expected, "{ahead}/{active}*{avg}");
                    assert!(got * active >= ahead * i64::from(avg));
                    assert!((got - 1) * active < ahead * i64::from(avg) || got == 0);
                }
            }
        }
    }

    #[test]
    fn test_estimate_counts_same_flight_active_earlier_tickets() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let company = tx.upsert_company(&NewCompany::new("AF", "Air France", 5)).unwrap();
        let service = tx.upsert_service(&NewService::new("Check-in", 'C')).unwrap();

        for raw in ["A1", "A2"] {
            tx.set_counter_company(&CounterName::parse(raw).unwrap(), Some("AF"))
                .unwrap();
        }
        let closed = CounterName::parse("A3").unwrap();
        tx.set_counter_company(&closed, Some("AF")).unwrap();
        tx.compare_and_set_counter_status(&closed, CounterStatus::Libre, CounterStatus::Ferme)
            .unwrap();

        let base = Utc::now();
        let mut seq = 0;
        let mut insert = |number: &str, offset_secs: i64| {
            seq += 1;
            tx.insert_ticket(&NewTicket {
                ticket_number: number.to_string(),
                queue_number: format!("C{:03}", seq),
                service_id: service.id,
                created_at: base + Duration::seconds(offset_secs),
                estimated_waiting_time_minutes: 0,
            })
            .unwrap()
        };

        insert("AF480", -30);
        insert("af480", -20);
        let done = insert("AF480", -10);
        insert("AF123", -5); // other flight
        insert("AF480", 10); // later
        tx.update_ticket_status(done.id, TicketStatus::Done, None)
            .unwrap();

        // Two ahead, two open counters, five minutes each.
        let estimate = estimate_wait_minutes(tx.as_ref(), &company, "AF480", base).unwrap();
        assert_eq!(estimate, 5);
    }

    #[test]
    fn test_estimate_without_open_counters() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let tx = store.begin().unwrap();
        let company = tx.upsert_company(&NewCompany::new("KP", "ASKY", 4)).unwrap();

        let estimate = estimate_wait_minutes(tx.as_ref(), &company, "KP001", Utc::now()).unwrap();
        assert_eq!(estimate, NO_ESTIMATE);
    }
}
