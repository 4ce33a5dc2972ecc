//! Counter API handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use guichet_core::{CounterLoad, Ticket};
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::state::AppState;

/// Response for listing counters
#[derive(Debug, Serialize)]
pub struct CounterOverviewResponse {
    pub counters: Vec<CounterLoad>,
}

/// Response for a counter's queue
#[derive(Debug, Serialize)]
pub struct CounterQueueResponse {
    pub counter: String,
    pub tickets: Vec<Ticket>,
}

/// Response for call-next. `ticket` is null when the queue is empty.
#[derive(Debug, Serialize)]
pub struct CallNextResponse {
    pub counter: String,
    pub ticket: Option<Ticket>,
}

pub async fn list_counters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CounterOverviewResponse>, ApiError> {
    let counters = state.dispatcher().counter_overview()?;
    Ok(Json(CounterOverviewResponse { counters }))
}

pub async fn counter_queue(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CounterQueueResponse>, ApiError> {
    let tickets = state.dispatcher().counter_queue(&name)?;
    Ok(Json(CounterQueueResponse {
        counter: name.trim().to_ascii_uppercase(),
        tickets,
    }))
}

/// Call the oldest waiting ticket at a counter
pub async fn call_next(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CallNextResponse>, ApiError> {
    let ticket = state.dispatcher().call_next(&name)?;
    Ok(Json(CallNextResponse {
        counter: name.trim().to_ascii_uppercase(),
        ticket,
    }))
}

pub async fn open_counter(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CounterLoad>, ApiError> {
    Ok(Json(state.dispatcher().open_counter(&name)?))
}

pub async fn close_counter(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CounterLoad>, ApiError> {
    Ok(Json(state.dispatcher().close_counter(&name)?))
}
