use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{counters, handlers, middleware::metrics_middleware, registry, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Registry
        .route("/services", get(registry::list_services))
        .route("/companies", get(registry::list_companies))
        .route("/flights", get(registry::list_flights))
        .route("/flights/{number}", get(registry::get_flight))
        // Counters
        .route("/counters", get(counters::list_counters))
        .route("/counters/{name}/tickets", get(counters::counter_queue))
        .route("/counters/{name}/call-next", post(counters::call_next))
        .route("/counters/{name}/open", post(counters::open_counter))
        .route("/counters/{name}/close", post(counters::close_counter))
        // Tickets
        .route("/tickets", post(tickets::register_ticket))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/statistics", get(tickets::get_statistics))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/{action}", post(tickets::advance_ticket))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
