//! Root endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    status: &'static str,
    name: String,
    description: String,
}

/// Confirms the service is reachable. Says nothing about the worker.
pub async fn index(State(state): State<AppState>) -> Json<ServiceInfo> {
    let service = &state.config.service;
    Json(ServiceInfo {
        status: "running",
        name: service.name.clone(),
        description: service.description.clone(),
    })
}
