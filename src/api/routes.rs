//! API route configuration.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;
use crate::db::Database;
use crate::mcp::{ServerProfile, create_mcp_service};

/// Build the router: `/health` plus the MCP service under `/mcp`.
pub fn create_router<D: Database + 'static>(
    db: Arc<D>,
    profile: ServerProfile,
    cancellation_token: CancellationToken,
) -> Router {
    let mcp_service = create_mcp_service::<D>(Arc::clone(&db), profile, cancellation_token);

    Router::new()
        .route("/health", get(handlers::health::<D>))
        .with_state(AppState::new(db))
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
}
