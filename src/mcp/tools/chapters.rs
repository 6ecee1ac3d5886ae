//! MCP tools for Chapter and Scene management.

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
    Chapter, ChapterOrder, ChapterRepository, ChapterStatus, ChapterUpdate, Database, NewChapter,
    NewScene, Scene,
};
use crate::mcp::tools::{RoutedTools, map_db_error, map_fk_error, or_not_set, text_result};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListChaptersParams {
    #[schemars(description = "Book ID whose chapters to list")]
    pub book_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetChapterParams {
    #[schemars(description = "Chapter ID")]
    pub chapter_id: i64,
    #[serde(default)]
    #[schemars(description = "Also list the chapter's scenes (default: false)")]
    pub include_scenes: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateChapterParams {
    #[schemars(description = "Book ID the chapter belongs to")]
    pub book_id: i64,
    #[schemars(description = "Chapter number, positive and unique within the book")]
    pub chapter_number: i64,
    #[schemars(description = "Chapter title (optional)")]
    pub title: Option<String>,
    #[schemars(description = "What happens in the chapter (optional)")]
    pub summary: Option<String>,
    #[schemars(description = "Status: 'planned' (default), 'drafted', 'revised', 'final'")]
    pub status: Option<ChapterStatus>,
    #[schemars(description = "Point-of-view character (optional)")]
    pub pov_character: Option<String>,
    #[schemars(description = "Working notes (optional)")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateChapterParams {
    #[schemars(description = "Chapter ID to update")]
    pub chapter_id: i64,
    #[schemars(
        description = "New chapter number (optional). To renumber several chapters use reorder_chapters."
    )]
    pub chapter_number: Option<i64>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New title (optional). Pass null to clear."
    )]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New summary (optional). Pass null to clear."
    )]
    pub summary: Option<Option<String>>,
    #[schemars(description = "Current word count (optional)")]
    pub word_count: Option<i64>,
    #[schemars(description = "New status (optional)")]
    pub status: Option<ChapterStatus>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New point-of-view character (optional). Pass null to clear."
    )]
    pub pov_character: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New notes (optional). Pass null to clear."
    )]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteChapterParams {
    #[schemars(
        description = "Chapter ID to delete. Its scenes and location presence records go with it."
    )]
    pub chapter_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReorderChaptersParams {
    #[schemars(description = "Book ID whose chapters are renumbered")]
    pub book_id: i64,
    #[schemars(
        description = "New numbers as [{chapter_id, new_chapter_number}]. Every chapter must belong to the book and targets must be unique. Applied atomically."
    )]
    pub chapter_order: Vec<ChapterOrder>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateSceneParams {
    #[schemars(description = "Chapter ID the scene belongs to")]
    pub chapter_id: i64,
    #[schemars(description = "Scene number, positive and unique within the chapter")]
    pub scene_number: i64,
    #[schemars(description = "Scene title (optional)")]
    pub title: Option<String>,
    #[schemars(description = "What happens in the scene (optional)")]
    pub summary: Option<String>,
    #[schemars(description = "Word count (default: 0)")]
    pub word_count: Option<i64>,
    #[schemars(description = "Point-of-view character (optional)")]
    pub pov_character: Option<String>,
}

// =============================================================================
// Chapter Tools
// =============================================================================

#[derive(Clone)]
pub struct ChapterTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_chapter(chapter: &Chapter) -> String {
    format!(
        "Chapter {} (id {}): {}\nBook: {}\nStatus: {}\nWords: {}\nPOV: {}\nSummary: {}\nNotes: {}\nUpdated: {}",
        chapter.chapter_number,
        chapter.id,
        or_not_set(chapter.title.as_deref()),
        chapter.book_id,
        chapter.status,
        chapter.word_count,
        or_not_set(chapter.pov_character.as_deref()),
        or_not_set(chapter.summary.as_deref()),
        or_not_set(chapter.notes.as_deref()),
        chapter.updated_at,
    )
}

fn format_chapter_line(chapter: &Chapter) -> String {
    format!(
        "- Chapter {}: {} [{}], {} words, POV {} (id {})",
        chapter.chapter_number,
        or_not_set(chapter.title.as_deref()),
        chapter.status,
        chapter.word_count,
        or_not_set(chapter.pov_character.as_deref()),
        chapter.id
    )
}

fn format_scene_line(scene: &Scene) -> String {
    format!(
        "- Scene {}: {}, {} words, POV {}\n  {}",
        scene.scene_number,
        or_not_set(scene.title.as_deref()),
        scene.word_count,
        or_not_set(scene.pov_character.as_deref()),
        or_not_set(scene.summary.as_deref())
    )
}

#[tool_router]
impl<D: Database + 'static> ChapterTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List a book's chapters in order with status and word counts.")]
    pub async fn list_chapters(
        &self,
        Parameters(params): Parameters<ListChaptersParams>,
    ) -> Result<CallToolResult, McpError> {
        let chapters = self
            .db
            .chapters()
            .list_by_book(params.book_id)
            .await
            .map_err(map_db_error("Failed to list chapters"))?;

        if chapters.is_empty() {
            return text_result(format!("No chapters found for book {}.", params.book_id));
        }

        let total_words: i64 = chapters.iter().map(|c| c.word_count).sum();
        let mut text = format!(
            "Book {} has {} chapter(s), {} words total:\n",
            params.book_id,
            chapters.len(),
            total_words
        );
        for chapter in &chapters {
            text.push('\n');
            text.push_str(&format_chapter_line(chapter));
        }
        text_result(text)
    }

    #[tool(description = "Get a chapter by ID. Set include_scenes to list its scenes.")]
    pub async fn get_chapter(
        &self,
        Parameters(params): Parameters<GetChapterParams>,
    ) -> Result<CallToolResult, McpError> {
        let chapter = self
            .db
            .chapters()
            .get(params.chapter_id)
            .await
            .map_err(map_db_error("Failed to get chapter"))?;

        let mut text = format_chapter(&chapter);

        if params.include_scenes {
            let scenes = self
                .db
                .chapters()
                .list_scenes(chapter.id)
                .await
                .map_err(map_db_error("Failed to get chapter"))?;

            text.push_str("\n\nScenes:");
            if scenes.is_empty() {
                text.push_str("\nNo scenes created yet");
            }
            for scene in &scenes {
                text.push('\n');
                text.push_str(&format_scene_line(scene));
            }
        }

        text_result(text)
    }

    #[tool(
        description = "Create a chapter in a book. chapter_number must be unique within the book."
    )]
    pub async fn create_chapter(
        &self,
        Parameters(params): Parameters<CreateChapterParams>,
    ) -> Result<CallToolResult, McpError> {
        let chapter = self
            .db
            .chapters()
            .create(&NewChapter {
                book_id: params.book_id,
                chapter_number: params.chapter_number,
                title: params.title,
                summary: params.summary,
                status: params.status.unwrap_or_default(),
                pov_character: params.pov_character,
                notes: params.notes,
            })
            .await
            .map_err(map_fk_error("Failed to create chapter", "Invalid book: not found"))?;

        text_result(format!("Created chapter\n\n{}", format_chapter(&chapter)))
    }

    #[tool(description = "Update a chapter. Only the provided fields change.")]
    pub async fn update_chapter(
        &self,
        Parameters(params): Parameters<UpdateChapterParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = ChapterUpdate {
            chapter_number: params.chapter_number,
            title: params.title,
            summary: params.summary,
            word_count: params.word_count,
            status: params.status,
            pov_character: params.pov_character,
            notes: params.notes,
        };

        let chapter = self
            .db
            .chapters()
            .update(params.chapter_id, &update)
            .await
            .map_err(map_db_error("Failed to update chapter"))?;

        text_result(format!("Updated chapter\n\n{}", format_chapter(&chapter)))
    }

    #[tool(
        description = "Delete a chapter together with its scenes and location presence records."
    )]
    pub async fn delete_chapter(
        &self,
        Parameters(params): Parameters<DeleteChapterParams>,
    ) -> Result<CallToolResult, McpError> {
        let deletion = self
            .db
            .chapters()
            .delete(params.chapter_id)
            .await
            .map_err(map_db_error("Failed to delete chapter"))?;

        text_result(format!(
            "Deleted chapter {} (id {}) from book {}\nAlso removed {} scene(s) and {} location presence record(s)",
            deletion.chapter.chapter_number,
            deletion.chapter.id,
            deletion.chapter.book_id,
            deletion.scene_count,
            deletion.presence_count
        ))
    }

    #[tool(description = "Renumber chapters of one book in a single atomic step.")]
    pub async fn reorder_chapters(
        &self,
        Parameters(params): Parameters<ReorderChaptersParams>,
    ) -> Result<CallToolResult, McpError> {
        let chapters = self
            .db
            .chapters()
            .reorder(params.book_id, &params.chapter_order)
            .await
            .map_err(map_db_error("Failed to reorder chapters"))?;

        let mut text = format!(
            "Reordered {} chapter(s) in book {}. Current order:\n",
            params.chapter_order.len(),
            params.book_id
        );
        for chapter in &chapters {
            text.push('\n');
            text.push_str(&format_chapter_line(chapter));
        }
        text_result(text)
    }

    #[tool(
        description = "Create a scene inside a chapter. scene_number must be unique within the chapter."
    )]
    pub async fn create_scene(
        &self,
        Parameters(params): Parameters<CreateSceneParams>,
    ) -> Result<CallToolResult, McpError> {
        let scene = self
            .db
            .chapters()
            .create_scene(&NewScene {
                chapter_id: params.chapter_id,
                scene_number: params.scene_number,
                title: params.title,
                summary: params.summary,
                word_count: params.word_count,
                pov_character: params.pov_character,
            })
            .await
            .map_err(map_fk_error("Failed to create scene", "Invalid chapter: not found"))?;

        text_result(format!(
            "Created scene {} (id {}) in chapter {}\n{}",
            scene.scene_number,
            scene.id,
            scene.chapter_id,
            format_scene_line(&scene)
        ))
    }
}

impl<D: Database + 'static> RoutedTools for ChapterTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
