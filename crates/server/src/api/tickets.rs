//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use guichet_core::{Registration, Statistics, Ticket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a traveler
#[derive(Debug, Deserialize)]
pub struct RegisterTicketBody {
    /// Flight number scanned from the boarding pass
    pub flight_number: String,
    /// Queue the traveler joins
    pub service_id: i64,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    pub flight_number: String,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a traveler and route the ticket to a counter
pub async fn register_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterTicketBody>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration = state
        .dispatcher()
        .register_ticket(&body.flight_number, body.service_id)?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// List every ticket issued for a flight
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let tickets = state.dispatcher().tickets_for_flight(&params.flight_number)?;
    let total = tickets.len();
    Ok(Json(ListTicketsResponse { tickets, total }))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.dispatcher().ticket(id)?))
}

/// Apply a staff action (call, serve, skip)
pub async fn advance_ticket(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(i64, String)>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.dispatcher().advance_ticket(id, &action)?))
}

pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Statistics>, ApiError> {
    Ok(Json(state.dispatcher().statistics()?))
}
