#![allow(dead_code)]

//! Common test utilities for API testing.
//!
//! This module provides a test fixture that builds the router in-process
//! over a temporary SQLite store seeded with a small registry, so requests
//! can be driven through `tower::ServiceExt::oneshot` without a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use guichet_core::{apply_registry, load_config_from_str, QueueStore, SqliteQueueStore};
use guichet_server::{create_router, AppState};

/// Registry used by every fixture.
///
/// AF has two open counters, ET has a single closed one. KL operates a
/// flight that is not in the schedule.
pub const REGISTRY: &str = r#"
[dispatch]
utc_offset_minutes = 0

[[companies]]
code = "AF"
name = "Air France"
average_service_time_minutes = 4

[[companies]]
code = "ET"
name = "Ethiopian Airlines"
average_service_time_minutes = 6

[[companies]]
code = "KL"
name = "KLM"
average_service_time_minutes = 5

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
name = "B1"
company = "ET"
status = "FERME"
"#;

/// In-process server over a temporary database.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for assertions that bypass HTTP
    pub state: Arc<AppState>,
    /// Id of the "C" service
    pub checkin_service_id: i64,
    /// Temporary directory holding the database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("guichet.db");

        let config = load_config_from_str(REGISTRY).expect("Failed to parse registry");
        let store: Arc<dyn QueueStore> =
            Arc::new(SqliteQueueStore::new(&db_path).expect("Failed to open store"));
        apply_registry(store.as_ref(), &config).expect("Failed to apply registry");

        let state = Arc::new(AppState::new(config, store));
        let checkin_service_id = state
            .dispatcher()
            .list_services()
            .expect("Failed to list services")
            .into_iter()
            .find(|s| s.prefix == 'C')
            .map(|s| s.id)
            .expect("Check-in service missing");

        Self {
            router: create_router(Arc::clone(&state)),
            state,
            checkin_service_id,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// POST without a body (staff actions, counter commands).
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Register a traveler in the check-in queue.
    pub async fn register(&self, flight_number: &str) -> TestResponse {
        self.post(
            "/api/v1/tickets",
            serde_json::json!({
                "flight_number": flight_number,
                "service_id": self.checkin_service_id,
            }),
        )
        .await
    }

    /// Get raw text response (for the metrics endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
