//! MCP Streamable HTTP service creation
//!
//! This module provides functions to create the MCP service
//! that can be integrated with an Axum router.

use std::sync::Arc;

use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::server::{McpServer, ServerProfile};

/// Create MCP Streamable HTTP service
///
/// Every session gets its own [`McpServer`] sharing one database handle.
///
/// # Example
/// ```no_run
/// use axum::Router;
/// use tokio_util::sync::CancellationToken;
/// # use folio::db::SqliteDatabase;
/// # use folio::mcp::{ServerProfile, create_mcp_service};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = SqliteDatabase::in_memory().await?;
///
/// let ct = CancellationToken::new();
/// let mcp_service = create_mcp_service(db, ServerProfile::All, ct);
///
/// let app: Router = Router::new()
///     .nest_service("/mcp", mcp_service);
/// # Ok(())
/// # }
/// ```
pub fn create_mcp_service<D: Database + 'static>(
    db: impl Into<Arc<D>>,
    profile: ServerProfile,
    cancellation_token: CancellationToken,
) -> StreamableHttpService<McpServer, LocalSessionManager> {
    let db: Arc<D> = db.into();

    // rmcp expects io::Error from the factory
    let service_factory = move || -> Result<McpServer, std::io::Error> {
        McpServer::new(Arc::clone(&db), profile).map_err(std::io::Error::other)
    };

    let config = StreamableHttpServerConfig::default()
        .with_stateful_mode(true)
        .with_cancellation_token(cancellation_token);

    StreamableHttpService::new(
        service_factory,
        LocalSessionManager::default().into(),
        config,
    )
}
