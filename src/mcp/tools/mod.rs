//! MCP tool implementations
//!
//! Tool handlers are organized by entity family. Each family is a struct
//! generic over `D: Database` whose `#[tool_router]` impl block declares its
//! tools; rmcp derives the input schema from the `Parameters<T>` argument and
//! binds each definition to its handler.

use futures_util::{FutureExt, future::BoxFuture};
use miette::Diagnostic;
use rmcp::{
    ErrorData, RoleServer,
    handler::server::{router::tool::ToolRouter, tool::ToolCallContext},
    model::{CallToolRequestParams, CallToolResult, Content, ErrorCode, Tool},
    service::RequestContext,
};
use thiserror::Error;

use crate::db::DbError;

mod authors;
mod books;
mod chapters;
mod locations;
mod metadata;
mod series;
mod timeline;
mod tropes;

#[cfg(test)]
mod locations_test;

pub use authors::AuthorTools;
pub use books::BookTools;
pub use chapters::ChapterTools;
pub use locations::LocationTools;
pub use metadata::MetadataTools;
pub use series::SeriesTools;
pub use timeline::TimelineTools;
pub use tropes::TropeTools;

/// A tool family that owns an rmcp [`ToolRouter`] over itself.
pub trait RoutedTools: Sized + Send + Sync + 'static {
    fn router(&self) -> &ToolRouter<Self>;
}

/// Object-safe view of a tool family, so one server can hold families over
/// different handler types.
pub trait ToolGroup: Send + Sync {
    /// Definitions advertised through `list_tools`.
    fn definitions(&self) -> Vec<Tool>;

    fn has_tool(&self, name: &str) -> bool;

    /// Route a call to the handler registered under `request.name`.
    fn call_tool<'a>(
        &'a self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> BoxFuture<'a, Result<CallToolResult, ErrorData>>;
}

impl<T: RoutedTools> ToolGroup for T {
    fn definitions(&self) -> Vec<Tool> {
        self.router().list_all()
    }

    fn has_tool(&self, name: &str) -> bool {
        self.router().has_route(name)
    }

    fn call_tool<'a>(
        &'a self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> BoxFuture<'a, Result<CallToolResult, ErrorData>> {
        let context = ToolCallContext::new(self, request, context);
        self.router().call(context).boxed()
    }
}

/// Errors raised by tool dispatch and tool handlers.
#[derive(Error, Diagnostic, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    #[diagnostic(code(folio::mcp::unknown_tool))]
    UnknownTool { name: String },

    #[error("{entity} not found: {id}")]
    #[diagnostic(code(folio::mcp::not_found))]
    NotFound { entity: String, id: String },

    #[error("{message}")]
    #[diagnostic(code(folio::mcp::invalid_reference))]
    InvalidReference { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(folio::mcp::in_use),
        help("Remove or reassign the dependent records first")
    )]
    InUse { message: String },

    #[error("{operation}: {source}")]
    #[diagnostic(code(folio::mcp::operation_failed))]
    Operation {
        operation: &'static str,
        #[source]
        source: DbError,
    },

    #[error("Tool registered twice: {name}")]
    #[diagnostic(code(folio::mcp::duplicate_tool))]
    DuplicateTool { name: String },
}

impl From<ToolError> for ErrorData {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match &err {
            ToolError::UnknownTool { .. } => {
                ErrorData::new(ErrorCode::METHOD_NOT_FOUND, message, None)
            }
            ToolError::NotFound { .. } => ErrorData::resource_not_found(message, None),
            ToolError::InvalidReference { .. }
            | ToolError::InUse { .. } => ErrorData::invalid_params(message, None),
            ToolError::Operation { source, .. } => match source {
                DbError::Validation { .. }
                | DbError::NoFieldsToUpdate { .. }
                | DbError::ForeignKey { .. }
                | DbError::UniqueViolation { .. }
                | DbError::Constraint { .. } => ErrorData::invalid_params(message, None),
                _ => ErrorData::internal_error(message, None),
            },
            ToolError::DuplicateTool { .. } => ErrorData::internal_error(message, None),
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Default page size for list tools.
pub const DEFAULT_LIMIT: usize = 20;
/// Upper bound on page size for list tools.
pub const MAX_LIMIT: usize = 100;

/// Placeholder for an absent scalar field.
pub(crate) const NOT_SET: &str = "Not set";
/// Placeholder for an empty collection.
pub(crate) const NONE: &str = "None";

/// Clamp a caller-supplied page size.
pub fn apply_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Map a repository error, turning `NotFound` into the typed tool error and
/// prefixing everything else with the operation.
pub(crate) fn map_db_error(operation: &'static str) -> impl FnOnce(DbError) -> ToolError {
    move |err| match err {
        DbError::NotFound { entity_type, id } => ToolError::NotFound {
            entity: entity_type,
            id,
        },
        source => ToolError::Operation { operation, source },
    }
}

/// Like [`map_db_error`], but a foreign-key failure names the missing parent.
pub(crate) fn map_fk_error(
    operation: &'static str,
    message: &'static str,
) -> impl FnOnce(DbError) -> ToolError {
    move |err| match err {
        DbError::ForeignKey { .. } => ToolError::InvalidReference {
            message: message.to_string(),
        },
        other => map_db_error(operation)(other),
    }
}

/// Like [`map_db_error`], but a foreign-key failure means dependents still exist.
pub(crate) fn map_in_use_error(
    operation: &'static str,
    message: String,
) -> impl FnOnce(DbError) -> ToolError {
    move |err| match err {
        DbError::ForeignKey { .. } => ToolError::InUse { message },
        other => map_db_error(operation)(other),
    }
}

/// Wrap formatted text in a successful tool result.
pub(crate) fn text_result(text: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

/// Render an optional value, substituting [`NOT_SET`].
pub(crate) fn or_not_set<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_SET.to_string(), |v| v.to_string())
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
