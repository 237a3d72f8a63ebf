//! Health check endpoints for the hosting platform.
//!
//! `/health` is a liveness probe for this process only: it returns 200 whenever
//! the server can answer HTTP, whether or not the worker is alive.
//!
//! `/health/worker` is separate and reports the worker's state as last recorded
//! by the supervisor in the heartbeat file. It returns 503 unless a fresh
//! `running` heartbeat exists. After the supervisor stops it reports `detached`:
//! the worker may still be alive, but nothing is watching it.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::heartbeat::{Freshness, Heartbeat};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
}

/// Health check handler.
///
/// This is a liveness probe - it only checks that the process can respond to HTTP.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}

#[derive(Debug, Serialize)]
pub struct WorkerHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl WorkerHealth {
    fn unknown() -> Self {
        Self {
            status: "unknown",
            pid: None,
            exit_code: None,
            started_at: None,
            updated_at: None,
        }
    }

    fn from_heartbeat(status: &'static str, hb: &Heartbeat) -> Self {
        Self {
            status,
            pid: Some(hb.pid),
            exit_code: hb.exit_code,
            started_at: Some(hb.started_at),
            updated_at: Some(hb.updated_at),
        }
    }
}

/// Worker health handler, backed by the supervisor's heartbeat file.
pub async fn worker(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<WorkerHealth>), AppError> {
    let Some(path) = state.config.worker.heartbeat_file.clone() else {
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(WorkerHealth::unknown())));
    };

    let heartbeat = tokio::task::spawn_blocking(move || Heartbeat::read(&path))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let Some(hb) = heartbeat else {
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(WorkerHealth::unknown())));
    };

    let stale_after = state.config.supervisor.stale_after();
    let (code, status) = match hb.freshness(Utc::now(), stale_after) {
        Freshness::Alive => (StatusCode::OK, "alive"),
        Freshness::Exited => (StatusCode::SERVICE_UNAVAILABLE, "exited"),
        Freshness::Stale => (StatusCode::SERVICE_UNAVAILABLE, "stale"),
        Freshness::Detached => (StatusCode::SERVICE_UNAVAILABLE, "detached"),
    };

    Ok((code, Json(WorkerHealth::from_heartbeat(status, &hb))))
}
