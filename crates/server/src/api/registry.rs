//! Read-only registry endpoints (services, companies, flights).

use axum::{
    extract::{Path, State},
    Json,
};
use guichet_core::{Company, Flight, Service};
use std::sync::Arc;

use super::error::ApiError;
use crate::state::AppState;

pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, ApiError> {
    Ok(Json(state.dispatcher().list_services()?))
}

pub async fn list_companies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Company>>, ApiError> {
    Ok(Json(state.dispatcher().list_companies()?))
}

pub async fn list_flights(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Flight>>, ApiError> {
    Ok(Json(state.dispatcher().list_flights()?))
}

pub async fn get_flight(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Flight>, ApiError> {
    Ok(Json(state.dispatcher().flight(&number)?))
}
