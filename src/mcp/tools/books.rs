//! MCP tools for Book management.

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
    Book, BookQuery, BookRepository, BookStatus, BookUpdate, ChapterRepository, Database,
    MetadataRepository, NewBook, PageSort,
};
use crate::mcp::tools::{
    NONE, RoutedTools, apply_limit, map_db_error, map_fk_error, or_not_set, text_result,
};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListBooksParams {
    #[schemars(description = "Only list books in this series (optional)")]
    pub series_id: Option<i64>,
    #[schemars(
        description = "Filter by status: 'planned', 'outlined', 'drafting', 'revising', 'complete', 'published' (optional)"
    )]
    pub status: Option<BookStatus>,
    #[schemars(description = "Maximum number of books to return (default: 20, max: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of books to skip for pagination")]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetBookParams {
    #[schemars(description = "Book ID")]
    pub book_id: i64,
    #[serde(default)]
    #[schemars(description = "Also list the book's chapters (default: false)")]
    pub include_chapters: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateBookParams {
    #[schemars(description = "Series ID the book belongs to")]
    pub series_id: i64,
    #[schemars(description = "Book title")]
    pub title: String,
    #[schemars(
        description = "Position in the series (optional). Must be unique within the series."
    )]
    pub book_number: Option<i64>,
    #[schemars(description = "Status (default: 'planned')")]
    pub status: Option<BookStatus>,
    #[schemars(description = "Target word count (optional)")]
    pub target_word_count: Option<i64>,
    #[schemars(description = "Publication year (optional)")]
    pub publication_year: Option<i64>,
    #[schemars(description = "Blurb or synopsis (optional)")]
    pub description: Option<String>,
    #[schemars(description = "ISBN (optional)")]
    pub isbn: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateBookParams {
    #[schemars(description = "Book ID to update")]
    pub book_id: i64,
    #[schemars(description = "New title (optional)")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New position in the series (optional). Pass null to clear."
    )]
    pub book_number: Option<Option<i64>>,
    #[schemars(description = "New status (optional)")]
    pub status: Option<BookStatus>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New target word count (optional). Pass null to clear."
    )]
    pub target_word_count: Option<Option<i64>>,
    #[schemars(description = "Current word count (optional)")]
    pub actual_word_count: Option<i64>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New publication year (optional). Pass null to clear."
    )]
    pub publication_year: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New description (optional). Pass null to clear."
    )]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New ISBN (optional). Pass null to clear."
    )]
    pub isbn: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteBookParams {
    #[schemars(
        description = "Book ID to delete. Its chapters and scenes are deleted with it."
    )]
    pub book_id: i64,
}

// =============================================================================
// Book Tools
// =============================================================================

#[derive(Clone)]
pub struct BookTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_book(book: &Book) -> String {
    let number = book
        .book_number
        .map_or_else(|| "Unnumbered".to_string(), |n| format!("Book #{}", n));
    format!(
        "Book #{}: {}\nSeries: {} ({})\nStatus: {}\nWords: {} / {}\nPublished: {}\nISBN: {}\nDescription: {}\nCreated: {}\nUpdated: {}",
        book.id,
        book.title,
        book.series_id,
        number,
        book.status,
        book.actual_word_count,
        or_not_set(book.target_word_count),
        or_not_set(book.publication_year),
        or_not_set(book.isbn.as_deref()),
        or_not_set(book.description.as_deref()),
        book.created_at,
        book.updated_at,
    )
}

#[tool_router]
impl<D: Database + 'static> BookTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "List books ordered by series and position. Filter by series_id or status."
    )]
    pub async fn list_books(
        &self,
        Parameters(params): Parameters<ListBooksParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = BookQuery {
            page: PageSort {
                limit: Some(apply_limit(params.limit)),
                offset: params.offset,
            },
            series_id: params.series_id,
            status: params.status,
        };

        let result = self
            .db
            .books()
            .list(&query)
            .await
            .map_err(map_db_error("Failed to list books"))?;

        if result.items.is_empty() {
            return text_result("No books found.");
        }

        let mut text = format!(
            "Found {} book(s), showing {} from offset {}:\n",
            result.total,
            result.items.len(),
            result.offset
        );
        for book in &result.items {
            text.push_str(&format!(
                "\n- #{} {} (series {}, number {}) [{}], {} words",
                book.id,
                book.title,
                book.series_id,
                or_not_set(book.book_number),
                book.status,
                book.actual_word_count
            ));
        }
        text_result(text)
    }

    #[tool(
        description = "Get a book by ID with its genres. Set include_chapters to list its chapters."
    )]
    pub async fn get_book(
        &self,
        Parameters(params): Parameters<GetBookParams>,
    ) -> Result<CallToolResult, McpError> {
        let book = self
            .db
            .books()
            .get(params.book_id)
            .await
            .map_err(map_db_error("Failed to get book"))?;

        let genres = self
            .db
            .metadata()
            .book_genres(book.id)
            .await
            .map_err(map_db_error("Failed to get book"))?;

        let mut text = format_book(&book);
        let genre_names: Vec<String> = genres
            .iter()
            .map(|g| {
                if g.is_primary {
                    format!("{} (primary)", g.name)
                } else {
                    g.name.clone()
                }
            })
            .collect();
        text.push_str(&format!(
            "\nGenres: {}",
            if genre_names.is_empty() {
                NONE.to_string()
            } else {
                genre_names.join(", ")
            }
        ));

        if params.include_chapters {
            let chapters = self
                .db
                .chapters()
                .list_by_book(book.id)
                .await
                .map_err(map_db_error("Failed to get book"))?;

            text.push_str("\n\nChapters:");
            if chapters.is_empty() {
                text.push_str("\nNo chapters created yet");
            }
            for chapter in &chapters {
                text.push_str(&format!(
                    "\n- Chapter {}: {} [{}], {} words (id {})",
                    chapter.chapter_number,
                    or_not_set(chapter.title.as_deref()),
                    chapter.status,
                    chapter.word_count,
                    chapter.id
                ));
            }
        }

        text_result(text)
    }

    #[tool(
        description = "Create a new book in a series. book_number must be unique within the series."
    )]
    pub async fn create_book(
        &self,
        Parameters(params): Parameters<CreateBookParams>,
    ) -> Result<CallToolResult, McpError> {
        let book = self
            .db
            .books()
            .create(&NewBook {
                series_id: params.series_id,
                title: params.title,
                book_number: params.book_number,
                status: params.status.unwrap_or_default(),
                target_word_count: params.target_word_count,
                publication_year: params.publication_year,
                description: params.description,
                isbn: params.isbn,
            })
            .await
            .map_err(map_fk_error("Failed to create book", "Invalid series: not found"))?;

        text_result(format!("Created book\n\n{}", format_book(&book)))
    }

    #[tool(description = "Update a book. Only the provided fields change.")]
    pub async fn update_book(
        &self,
        Parameters(params): Parameters<UpdateBookParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = BookUpdate {
            title: params.title,
            book_number: params.book_number,
            status: params.status,
            target_word_count: params.target_word_count,
            actual_word_count: params.actual_word_count,
            publication_year: params.publication_year,
            description: params.description,
            isbn: params.isbn,
        };

        let book = self
            .db
            .books()
            .update(params.book_id, &update)
            .await
            .map_err(map_db_error("Failed to update book"))?;

        text_result(format!("Updated book\n\n{}", format_book(&book)))
    }

    #[tool(
        description = "Delete a book together with its chapters and scenes. Reports what was removed."
    )]
    pub async fn delete_book(
        &self,
        Parameters(params): Parameters<DeleteBookParams>,
    ) -> Result<CallToolResult, McpError> {
        let deletion = self
            .db
            .books()
            .delete(params.book_id)
            .await
            .map_err(map_db_error("Failed to delete book"))?;

        text_result(format!(
            "Deleted book #{}: {}\nAlso removed {} chapter(s) and {} scene(s)",
            deletion.book.id, deletion.book.title, deletion.chapter_count, deletion.scene_count
        ))
    }
}

impl<D: Database + 'static> RoutedTools for BookTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
