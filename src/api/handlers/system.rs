//! System health handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::{instrument, warn};

use crate::api::state::AppState;
use crate::db::{Database, HealthStatus};

/// Health check endpoint
///
/// 200 with the health status when the database answers, 503 otherwise.
#[instrument(skip(state))]
pub async fn health<D: Database>(
    State(state): State<AppState<D>>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = state.db().health_check().await;

    if status.healthy {
        (StatusCode::OK, Json(status))
    } else {
        warn!(error = ?status.error, "Database health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, Json(status))
    }
}
