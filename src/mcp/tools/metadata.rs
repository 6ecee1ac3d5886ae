//! MCP tools for lookup options, book genres and series metadata.

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
    BookGenre, Database, GenreAssignment, LookupOption, LookupOptionUpdate, MetadataRepository,
    NewLookupOption, OptionRemoval, OptionType,
};
use crate::mcp::tools::{
    NONE, RoutedTools, map_db_error, map_fk_error, map_in_use_error, or_not_set, text_result,
};

fn default_true() -> bool {
    true
}

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListLookupOptionsParams {
    #[schemars(
        description = "Lookup table: 'genre', 'relationship_type', 'plot_thread_type', 'plot_thread_status'"
    )]
    pub option_type: OptionType,
    #[serde(default)]
    #[schemars(description = "Include deactivated options (default: false)")]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateLookupOptionParams {
    #[schemars(description = "Lookup table the option belongs to")]
    pub option_type: OptionType,
    #[schemars(description = "Option name, unique within its lookup table")]
    pub name: String,
    #[schemars(description = "Description (optional)")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateLookupOptionParams {
    #[schemars(description = "Option ID to update")]
    pub option_id: i64,
    #[schemars(description = "New name (optional)")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New description (optional). Pass null to clear."
    )]
    pub description: Option<Option<String>>,
    #[schemars(description = "Set to true to reactivate, false to deactivate (optional)")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteLookupOptionParams {
    #[schemars(description = "Option ID to delete")]
    pub option_id: i64,
    #[serde(default = "default_true")]
    #[schemars(
        description = "Only mark the option inactive (default: true). A hard delete fails while the option is in use."
    )]
    pub soft_delete: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AssignBookGenresParams {
    #[schemars(description = "Book ID")]
    pub book_id: i64,
    #[schemars(
        description = "Complete genre set as [{genre_id, is_primary}]. Replaces the current set; at most one primary. Pass [] to clear."
    )]
    pub genres: Vec<GenreAssignment>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetBookGenresParams {
    #[schemars(description = "Book ID")]
    pub book_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetSeriesMetadataParams {
    #[schemars(description = "Series ID")]
    pub series_id: i64,
    #[schemars(description = "Metadata key, e.g. 'tone', 'target_audience'")]
    pub key: String,
    #[schemars(description = "Value to store (optional). Omit or null to store an empty value.")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetSeriesMetadataParams {
    #[schemars(description = "Series ID")]
    pub series_id: i64,
    #[schemars(description = "Only return this key (optional)")]
    pub key: Option<String>,
}

// =============================================================================
// Metadata Tools
// =============================================================================

#[derive(Clone)]
pub struct MetadataTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_option(option: &LookupOption) -> String {
    format!(
        "{} #{}: {}{}\nDescription: {}",
        option.option_type,
        option.id,
        option.name,
        if option.is_active { "" } else { " (inactive)" },
        or_not_set(option.description.as_deref())
    )
}

fn format_genres(book_id: i64, genres: &[BookGenre]) -> String {
    let mut text = format!("Genres of book {}:", book_id);
    if genres.is_empty() {
        text.push_str(&format!(" {}", NONE));
    }
    for genre in genres {
        text.push_str(&format!(
            "\n- #{} {}{}",
            genre.genre_id,
            genre.name,
            if genre.is_primary { " (primary)" } else { "" }
        ));
    }
    text
}

#[tool_router]
impl<D: Database + 'static> MetadataTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "List options of one lookup table (genres, relationship types, plot thread types or statuses)."
    )]
    pub async fn list_lookup_options(
        &self,
        Parameters(params): Parameters<ListLookupOptionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let options = self
            .db
            .metadata()
            .list_options(params.option_type, params.include_inactive)
            .await
            .map_err(map_db_error("Failed to list lookup options"))?;

        if options.is_empty() {
            return text_result(format!("No {} options found.", params.option_type));
        }

        let mut text = format!("{} option(s) of type {}:\n", options.len(), params.option_type);
        for option in &options {
            text.push_str(&format!(
                "\n- #{} {}{}",
                option.id,
                option.name,
                if option.is_active { "" } else { " (inactive)" }
            ));
        }
        text_result(text)
    }

    #[tool(description = "Create a lookup option.")]
    pub async fn create_lookup_option(
        &self,
        Parameters(params): Parameters<CreateLookupOptionParams>,
    ) -> Result<CallToolResult, McpError> {
        let option = self
            .db
            .metadata()
            .create_option(&NewLookupOption {
                option_type: params.option_type,
                name: params.name,
                description: params.description,
            })
            .await
            .map_err(map_db_error("Failed to create lookup option"))?;

        text_result(format!("Created lookup option\n\n{}", format_option(&option)))
    }

    #[tool(description = "Update a lookup option, including reactivating it.")]
    pub async fn update_lookup_option(
        &self,
        Parameters(params): Parameters<UpdateLookupOptionParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = LookupOptionUpdate {
            name: params.name,
            description: params.description,
            is_active: params.is_active,
        };

        let option = self
            .db
            .metadata()
            .update_option(params.option_id, &update)
            .await
            .map_err(map_db_error("Failed to update lookup option"))?;

        text_result(format!("Updated lookup option\n\n{}", format_option(&option)))
    }

    #[tool(
        description = "Deactivate a lookup option, or hard delete it when soft_delete is false and nothing references it."
    )]
    pub async fn delete_lookup_option(
        &self,
        Parameters(params): Parameters<DeleteLookupOptionParams>,
    ) -> Result<CallToolResult, McpError> {
        let removal = self
            .db
            .metadata()
            .delete_option(params.option_id, params.soft_delete)
            .await
            .map_err(map_in_use_error(
                "Failed to delete lookup option",
                format!(
                    "Lookup option {} is in use and cannot be deleted; deactivate it with soft_delete instead",
                    params.option_id
                ),
            ))?;

        match removal {
            OptionRemoval::Deactivated => text_result(format!(
                "Deactivated lookup option {}",
                params.option_id
            )),
            OptionRemoval::Deleted => {
                text_result(format!("Deleted lookup option {}", params.option_id))
            }
        }
    }

    #[tool(
        description = "Replace a book's genres atomically. Every ID must be an active genre; at most one primary."
    )]
    pub async fn assign_book_genres(
        &self,
        Parameters(params): Parameters<AssignBookGenresParams>,
    ) -> Result<CallToolResult, McpError> {
        let genres = self
            .db
            .metadata()
            .assign_book_genres(params.book_id, &params.genres)
            .await
            .map_err(map_db_error("Failed to assign book genres"))?;

        text_result(format!(
            "Assigned {} genre(s)\n\n{}",
            genres.len(),
            format_genres(params.book_id, &genres)
        ))
    }

    #[tool(description = "List a book's genres.")]
    pub async fn get_book_genres(
        &self,
        Parameters(params): Parameters<GetBookGenresParams>,
    ) -> Result<CallToolResult, McpError> {
        let genres = self
            .db
            .metadata()
            .book_genres(params.book_id)
            .await
            .map_err(map_db_error("Failed to get book genres"))?;

        text_result(format_genres(params.book_id, &genres))
    }

    #[tool(description = "Create or overwrite one metadata entry of a series.")]
    pub async fn set_series_metadata(
        &self,
        Parameters(params): Parameters<SetSeriesMetadataParams>,
    ) -> Result<CallToolResult, McpError> {
        let entry = self
            .db
            .metadata()
            .set_series_metadata(params.series_id, &params.key, params.value.as_deref())
            .await
            .map_err(map_fk_error(
                "Failed to set series metadata",
                "Invalid series: not found",
            ))?;

        text_result(format!(
            "Set {} = {} for series {}",
            entry.key,
            or_not_set(entry.value.as_deref()),
            params.series_id
        ))
    }

    #[tool(description = "List a series' metadata entries, optionally for one key.")]
    pub async fn get_series_metadata(
        &self,
        Parameters(params): Parameters<GetSeriesMetadataParams>,
    ) -> Result<CallToolResult, McpError> {
        let entries = self
            .db
            .metadata()
            .series_metadata(params.series_id, params.key.as_deref())
            .await
            .map_err(map_db_error("Failed to get series metadata"))?;

        if entries.is_empty() {
            return text_result(format!(
                "No metadata found for series {}.",
                params.series_id
            ));
        }

        let mut text = format!("Metadata for series {}:\n", params.series_id);
        for entry in &entries {
            text.push_str(&format!(
                "\n- {}: {} (updated {})",
                entry.key,
                or_not_set(entry.value.as_deref()),
                entry.updated_at
            ));
        }
        text_result(text)
    }
}

impl<D: Database + 'static> RoutedTools for MetadataTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
