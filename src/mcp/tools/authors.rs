//! MCP tools for Author management.

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

use crate::db::{Author, AuthorRepository, AuthorUpdate, Database, NewAuthor, PageSort};
use crate::mcp::tools::{
    RoutedTools, apply_limit, map_db_error, map_in_use_error, or_not_set, text_result,
};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListAuthorsParams {
    #[schemars(description = "Maximum number of authors to return (default: 20, max: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of authors to skip for pagination")]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetAuthorParams {
    #[schemars(description = "Author ID")]
    pub author_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateAuthorParams {
    #[schemars(description = "Author name (pen name or legal name)")]
    pub name: String,
    #[schemars(description = "Contact email (optional)")]
    pub email: Option<String>,
    #[schemars(description = "Short biography (optional)")]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateAuthorParams {
    #[schemars(description = "Author ID to update")]
    pub author_id: i64,
    #[schemars(description = "New name (optional)")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New email (optional). Pass null to clear."
    )]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New biography (optional). Pass null to clear."
    )]
    pub bio: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteAuthorParams {
    #[schemars(description = "Author ID to delete. Fails while any series belongs to the author.")]
    pub author_id: i64,
}

// =============================================================================
// Author Tools
// =============================================================================

#[derive(Clone)]
pub struct AuthorTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_author(author: &Author) -> String {
    format!(
        "Author #{}: {}\nEmail: {}\nBio: {}\nCreated: {}\nUpdated: {}",
        author.id,
        author.name,
        or_not_set(author.email.as_deref()),
        or_not_set(author.bio.as_deref()),
        author.created_at,
        author.updated_at,
    )
}

#[tool_router]
impl<D: Database + 'static> AuthorTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List authors alphabetically with pagination.")]
    pub async fn list_authors(
        &self,
        Parameters(params): Parameters<ListAuthorsParams>,
    ) -> Result<CallToolResult, McpError> {
        let page = PageSort {
            limit: Some(apply_limit(params.limit)),
            offset: params.offset,
        };

        let result = self
            .db
            .authors()
            .list(&page)
            .await
            .map_err(map_db_error("Failed to list authors"))?;

        if result.items.is_empty() {
            return text_result("No authors found.");
        }

        let mut text = format!(
            "Found {} author(s), showing {} from offset {}:\n",
            result.total,
            result.items.len(),
            result.offset
        );
        for author in &result.items {
            text.push_str(&format!(
                "\n- #{} {} ({})",
                author.id,
                author.name,
                or_not_set(author.email.as_deref())
            ));
        }
        text_result(text)
    }

    #[tool(description = "Get an author by ID.")]
    pub async fn get_author(
        &self,
        Parameters(params): Parameters<GetAuthorParams>,
    ) -> Result<CallToolResult, McpError> {
        let author = self
            .db
            .authors()
            .get(params.author_id)
            .await
            .map_err(map_db_error("Failed to get author"))?;

        text_result(format_author(&author))
    }

    #[tool(description = "Create a new author.")]
    pub async fn create_author(
        &self,
        Parameters(params): Parameters<CreateAuthorParams>,
    ) -> Result<CallToolResult, McpError> {
        let author = self
            .db
            .authors()
            .create(&NewAuthor {
                name: params.name,
                email: params.email,
                bio: params.bio,
            })
            .await
            .map_err(map_db_error("Failed to create author"))?;

        text_result(format!("Created author\n\n{}", format_author(&author)))
    }

    #[tool(description = "Update an author. Only the provided fields change.")]
    pub async fn update_author(
        &self,
        Parameters(params): Parameters<UpdateAuthorParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = AuthorUpdate {
            name: params.name,
            email: params.email,
            bio: params.bio,
        };

        let author = self
            .db
            .authors()
            .update(params.author_id, &update)
            .await
            .map_err(map_db_error("Failed to update author"))?;

        text_result(format!("Updated author\n\n{}", format_author(&author)))
    }

    #[tool(description = "Delete an author. Fails while the author still has series.")]
    pub async fn delete_author(
        &self,
        Parameters(params): Parameters<DeleteAuthorParams>,
    ) -> Result<CallToolResult, McpError> {
        let author = self
            .db
            .authors()
            .delete(params.author_id)
            .await
            .map_err(map_in_use_error(
                "Failed to delete author",
                format!(
                    "Author {} is in use: delete or reassign their series first",
                    params.author_id
                ),
            ))?;

        text_result(format!("Deleted author #{}: {}", author.id, author.name))
    }
}

impl<D: Database + 'static> RoutedTools for AuthorTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
