//! MCP tools for Series management.

use rmcp::{
    ErrorData as McpError,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::CallToolResult,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    Database, NewSeries, PageSort, Series, SeriesQuery, SeriesRepository, SeriesStatus,
    SeriesUpdate,
};
use crate::mcp::tools::{
    RoutedTools, apply_limit, map_db_error, map_fk_error, map_in_use_error, or_not_set, text_result,
};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListSeriesParams {
    #[schemars(description = "Only list series written by this author (optional)")]
    pub author_id: Option<i64>,
    #[schemars(description = "Maximum number of series to return (default: 20, max: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of series to skip for pagination")]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetSeriesParams {
    #[schemars(description = "Series ID")]
    pub series_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateSeriesParams {
    #[schemars(description = "Author ID that owns the series. Use list_authors to find it.")]
    pub author_id: i64,
    #[schemars(description = "Series title")]
    pub title: String,
    #[schemars(description = "Premise or pitch of the series (optional)")]
    pub description: Option<String>,
    #[schemars(description = "Year the series started (optional)")]
    pub start_year: Option<i64>,
    #[schemars(
        description = "Status: 'planning' (default), 'ongoing', 'completed', 'hiatus'"
    )]
    pub status: Option<SeriesStatus>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateSeriesParams {
    #[schemars(description = "Series ID to update")]
    pub series_id: i64,
    #[schemars(description = "Move the series to another author (optional)")]
    pub author_id: Option<i64>,
    #[schemars(description = "New title (optional)")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New description (optional). Pass null to clear."
    )]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New start year (optional). Pass null to clear."
    )]
    pub start_year: Option<Option<i64>>,
    #[schemars(description = "New status (optional)")]
    pub status: Option<SeriesStatus>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteSeriesParams {
    #[schemars(description = "Series ID to delete. Fails while the series still has books.")]
    pub series_id: i64,
}

// =============================================================================
// Series Tools
// =============================================================================

#[derive(Clone)]
pub struct SeriesTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_series(series: &Series) -> String {
    format!(
        "Series #{}: {}\nAuthor: {} (#{})\nStatus: {}\nStarted: {}\nBooks: {}\nDescription: {}\nCreated: {}\nUpdated: {}",
        series.id,
        series.title,
        or_not_set(series.author_name.as_deref()),
        series.author_id,
        series.status,
        or_not_set(series.start_year),
        series.book_count,
        or_not_set(series.description.as_deref()),
        series.created_at,
        series.updated_at,
    )
}

#[tool_router]
impl<D: Database + 'static> SeriesTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List series with their author and book count. Filter by author_id.")]
    pub async fn list_series(
        &self,
        Parameters(params): Parameters<ListSeriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = SeriesQuery {
            page: PageSort {
                limit: Some(apply_limit(params.limit)),
                offset: params.offset,
            },
            author_id: params.author_id,
        };

        let result = self
            .db
            .series()
            .list(&query)
            .await
            .map_err(map_db_error("Failed to list series"))?;

        if result.items.is_empty() {
            return text_result("No series found.");
        }

        let mut text = format!(
            "Found {} series, showing {} from offset {}:\n",
            result.total,
            result.items.len(),
            result.offset
        );
        for series in &result.items {
            text.push_str(&format!(
                "\n- #{} {} by {} [{}], {} book(s)",
                series.id,
                series.title,
                or_not_set(series.author_name.as_deref()),
                series.status,
                series.book_count
            ));
        }
        text_result(text)
    }

    #[tool(description = "Get a series by ID, including its author and book count.")]
    pub async fn get_series(
        &self,
        Parameters(params): Parameters<GetSeriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let series = self
            .db
            .series()
            .get(params.series_id)
            .await
            .map_err(map_db_error("Failed to get series"))?;

        text_result(format_series(&series))
    }

    #[tool(description = "Create a new series for an existing author.")]
    pub async fn create_series(
        &self,
        Parameters(params): Parameters<CreateSeriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let series = self
            .db
            .series()
            .create(&NewSeries {
                author_id: params.author_id,
                title: params.title,
                description: params.description,
                start_year: params.start_year,
                status: params.status.unwrap_or_default(),
            })
            .await
            .map_err(map_fk_error(
                "Failed to create series",
                "Invalid author: not found",
            ))?;

        text_result(format!("Created series\n\n{}", format_series(&series)))
    }

    #[tool(description = "Update a series. Only the provided fields change.")]
    pub async fn update_series(
        &self,
        Parameters(params): Parameters<UpdateSeriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = SeriesUpdate {
            author_id: params.author_id,
            title: params.title,
            description: params.description,
            start_year: params.start_year,
            status: params.status,
        };

        let series = self
            .db
            .series()
            .update(params.series_id, &update)
            .await
            .map_err(map_fk_error(
                "Failed to update series",
                "Invalid author: not found",
            ))?;

        text_result(format!("Updated series\n\n{}", format_series(&series)))
    }

    #[tool(description = "Delete a series. Fails while the series still has books.")]
    pub async fn delete_series(
        &self,
        Parameters(params): Parameters<DeleteSeriesParams>,
    ) -> Result<CallToolResult, McpError> {
        let series = self
            .db
            .series()
            .delete(params.series_id)
            .await
            .map_err(map_in_use_error(
                "Failed to delete series",
                format!(
                    "Series {} is in use: delete its books first",
                    params.series_id
                ),
            ))?;

        text_result(format!("Deleted series #{}: {}", series.id, series.title))
    }
}

impl<D: Database + 'static> RoutedTools for SeriesTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
