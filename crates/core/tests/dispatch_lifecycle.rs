//! Dispatch lifecycle integration tests.
//!
//! These tests run the dispatcher against a file-backed SQLite store:
//! - Registry bootstrap from TOML
//! - Queue numbering under concurrent registrations
//! - Load balancing across a company's counters
//! - Staff actions and statistics

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use guichet_core::{
    apply_registry, load_config_from_str, validate_config, CounterStatus, DispatchError,
    Dispatcher, QueueStore, SqliteQueueStore, TicketStatus,
};

const REGISTRY: &str = r#"
[dispatch]
utc_offset_minutes = 0

[[companies]]
code = "AF"
name = "Air France"
average_service_time_minutes = 5

[[companies]]
code = "ET"
name = "Ethiopian Airlines"
average_service_time_minutes = 6

[[services]]
name = "Check-in"
prefix = "C"

[[services]]
name = "Special assistance"
prefix = "S"

[[flights]]
flight_number = "AF480"
company_code = "AF"
departure_time = "2026-10-18T10:30:00Z"

[[flights]]
flight_number = "ET901"
company_code = "ET"
departure_time = "2026-10-18T12:15:00Z"

[[counters]]
name = "A1"
company = "AF"

[[counters]]
name = "A2"
company = "AF"

[[counters]]
name = "A3"
company = "AF"

[[counters]]
name = "B1"
company = "ET"
status = "FERME"
"#;

/// Test helper wiring a dispatcher to a temp database.
struct TestHarness {
    dispatcher: Dispatcher,
    store: Arc<SqliteQueueStore>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = open_store(&temp_dir.path().join("test.db"));

        let config = load_config_from_str(REGISTRY).expect("registry parses");
        validate_config(&config).expect("registry is valid");
        apply_registry(store.as_ref(), &config).expect("registry applies");

        let dispatcher = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn QueueStore>,
            config.dispatch.clone(),
        );

        Self {
            dispatcher,
            store,
            _temp_dir: temp_dir,
        }
    }

    fn service_id(&self, prefix: char) -> i64 {
        self.dispatcher
            .list_services()
            .unwrap()
            .into_iter()
            .find(|s| s.prefix == prefix)
            .map(|s| s.id)
            .expect("service exists")
    }
}

fn open_store(path: &Path) -> Arc<SqliteQueueStore> {
    Arc::new(SqliteQueueStore::new(path).expect("Failed to create store"))
}

#[test]
fn test_concurrent_registrations_get_unique_contiguous_numbers() {
    let harness = Arc::new(TestHarness::new());
    let service_id = harness.service_id('C');

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            thread::spawn(move || {
                (0..5)
                    .map(|_| {
                        harness
                            .dispatcher
                            .register_ticket("AF480", service_id)
                            .expect("registration succeeds")
                            .queue_number
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        for number in handle.join().unwrap() {
            assert!(numbers.insert(number.clone()), "duplicate queue number {number}");
        }
    }

    let expected: HashSet<String> = (1..=40).map(|n| format!("C{:03}", n)).collect();
    assert_eq!(numbers, expected);
}

#[test]
fn test_registrations_balance_across_counters() {
    let harness = TestHarness::new();
    let service_id = harness.service_id('C');

    let mut per_counter: BTreeMap<String, usize> = BTreeMap::new();
    for _ in 0..9 {
        let registration = harness
            .dispatcher
            .register_ticket("af480", service_id)
            .unwrap();
        let counter = registration.counter.expect("AF has open counters");
        *per_counter.entry(counter.to_string()).or_default() += 1;
    }

    assert_eq!(
        per_counter.into_iter().collect::<Vec<_>>(),
        vec![
            ("A1".to_string(), 3),
            ("A2".to_string(), 3),
            ("A3".to_string(), 3),
        ]
    );
    for counter in harness.dispatcher.counter_overview().unwrap() {
        if counter.counter.assigned_company.as_deref() == Some("AF") {
            assert_eq!(counter.counter.status, CounterStatus::Occupe);
            assert_eq!(counter.load, 3);
        }
    }
}

#[test]
fn test_closed_company_counters_and_reopen() {
    let harness = TestHarness::new();
    let service_id = harness.service_id('S');

    // ET's only counter starts closed.
    let first = harness.dispatcher.register_ticket("ET901", service_id).unwrap();
    assert!(first.counter.is_none());
    assert_eq!(first.estimated_waiting_time_minutes, -1);
    assert_eq!(first.queue_number, "S001");
    assert_eq!(first.company_name, "Ethiopian Airlines");

    let reopened = harness.dispatcher.open_counter("B1").unwrap();
    assert_eq!(reopened.counter.status, CounterStatus::Libre);

    let second = harness.dispatcher.register_ticket("ET901", service_id).unwrap();
    assert_eq!(second.counter.as_ref().map(|c| c.as_str()), Some("B1"));
    // The unassigned ticket is active and ahead on the same flight.
    assert_eq!(second.estimated_waiting_time_minutes, 6);
}

#[test]
fn test_staff_flow_and_statistics() {
    let harness = TestHarness::new();
    let checkin = harness.service_id('C');

    let ids: Vec<i64> = (0..3)
        .map(|_| {
            harness
                .dispatcher
                .register_ticket("AF480", checkin)
                .unwrap()
                .ticket_id
        })
        .collect();

    // A1 holds the first ticket.
    let called = harness.dispatcher.call_next("A1").unwrap().unwrap();
    assert_eq!(called.id, ids[0]);
    let served = harness.dispatcher.advance_ticket(ids[0], "serve").unwrap();
    assert_eq!(served.status, TicketStatus::Done);

    let err = harness.dispatcher.advance_ticket(ids[1], "skip").unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition { .. }));

    let stats = harness.dispatcher.statistics().unwrap();
    assert_eq!(stats.total_active, 2);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.average_wait_time_minutes, Some(0.0));
    assert_eq!(stats.by_company.len(), 1);
    assert_eq!(stats.by_company[0].code, "AF");
    assert_eq!(stats.by_company[0].count, 2);
    assert_eq!(stats.by_service[0].count, 2);
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("persist.db");
    let config = load_config_from_str(REGISTRY).unwrap();

    let ticket_id = {
        let store = open_store(&db_path);
        apply_registry(store.as_ref(), &config).unwrap();
        let dispatcher = Dispatcher::new(store, config.dispatch.clone());
        let service_id = dispatcher.list_services().unwrap()[0].id;
        dispatcher.register_ticket("AF480", service_id).unwrap().ticket_id
    };

    let store = open_store(&db_path);
    // Re-applying the registry must not reset counter occupancy.
    apply_registry(store.as_ref(), &config).unwrap();
    let dispatcher = Dispatcher::new(store, config.dispatch.clone());

    let ticket = dispatcher.ticket(ticket_id).unwrap();
    assert_eq!(ticket.queue_number, "C001");
    let a1 = dispatcher
        .counter_overview()
        .unwrap()
        .into_iter()
        .find(|c| c.counter.name.as_str() == "A1")
        .unwrap();
    assert_eq!(a1.counter.status, CounterStatus::Occupe);
    assert_eq!(a1.load, 1);
}
