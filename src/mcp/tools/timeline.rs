//! MCP tools for timeline events, event↔chapter mappings and narrative analysis.

use rmcp::{
    ErrorData as McpError,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::CallToolResult,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::{
    Completeness, Database, EventMapping, EventMappingUpdate, EventSignificance, MappingQuery,
    NewEventMapping, NewTimelineEvent, PresentationType, TimelineEvent, TimelineRepository,
};
use crate::mcp::tools::{RoutedTools, map_db_error, map_fk_error, or_not_set, text_result};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTimelineEventParams {
    #[schemars(description = "Series ID the event belongs to")]
    pub series_id: i64,
    #[schemars(description = "Event name, e.g. 'Fall of the capital'")]
    pub event_name: String,
    #[schemars(description = "In-world date as free text (optional)")]
    pub event_date: Option<String>,
    #[schemars(description = "What happened (optional)")]
    pub description: Option<String>,
    #[schemars(
        description = "Position on the in-world timeline. Lower values happen earlier."
    )]
    pub chronological_order: i64,
    #[schemars(
        description = "Significance: 'minor', 'moderate' (default), 'major', 'pivotal'"
    )]
    pub significance: Option<EventSignificance>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListTimelineEventsParams {
    #[schemars(description = "Series ID")]
    pub series_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MapEventToChapterParams {
    #[schemars(description = "Timeline event ID")]
    pub event_id: i64,
    #[schemars(description = "Chapter ID where the event is shown. Must be in the event's series.")]
    pub chapter_id: i64,
    #[schemars(description = "Scene number inside the chapter (optional)")]
    pub scene_number: Option<i64>,
    #[schemars(
        description = "How the event is presented: 'direct' (default), 'flashback', 'flashforward', 'reference', 'retelling'"
    )]
    pub presentation_type: Option<PresentationType>,
    #[schemars(description = "Point-of-view character for this presentation (optional)")]
    pub pov_character: Option<String>,
    #[schemars(description = "How much is shown: 'full' (default), 'partial', 'mentioned'")]
    pub completeness: Option<Completeness>,
    #[schemars(description = "Why the event is placed here, e.g. 'foreshadowing' (optional)")]
    pub narrative_function: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateEventMappingParams {
    #[schemars(description = "Mapping ID to update")]
    pub mapping_id: i64,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New scene number (optional). Pass null to clear."
    )]
    pub scene_number: Option<Option<i64>>,
    #[schemars(description = "New presentation type (optional)")]
    pub presentation_type: Option<PresentationType>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New point-of-view character (optional). Pass null to clear."
    )]
    pub pov_character: Option<Option<String>>,
    #[schemars(description = "New completeness (optional)")]
    pub completeness: Option<Completeness>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New narrative function (optional). Pass null to clear."
    )]
    pub narrative_function: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteEventMappingParams {
    #[schemars(description = "Mapping ID to delete")]
    pub mapping_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetEventMappingsParams {
    #[schemars(description = "Only mappings of this event (optional; event_id or chapter_id is required)")]
    pub event_id: Option<i64>,
    #[schemars(description = "Only mappings into this chapter (optional; event_id or chapter_id is required)")]
    pub chapter_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeNarrativeStructureParams {
    #[schemars(description = "Book ID to analyze")]
    pub book_id: i64,
}

// =============================================================================
// Analysis
// =============================================================================

/// Overall shape of a book's telling relative to in-world chronology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Linearity {
    Linear,
    MostlyLinear,
    ModeratelyNonLinear,
    HighlyNonLinear,
}

impl Linearity {
    pub(crate) fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Linearity::Linear
        } else if score >= 0.6 {
            Linearity::MostlyLinear
        } else if score >= 0.3 {
            Linearity::ModeratelyNonLinear
        } else {
            Linearity::HighlyNonLinear
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Linearity::Linear => "linear",
            Linearity::MostlyLinear => "mostly linear",
            Linearity::ModeratelyNonLinear => "moderately non-linear",
            Linearity::HighlyNonLinear => "highly non-linear",
        }
    }
}

/// A point where the reader moves back in story time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BackwardJump {
    pub from_event: String,
    pub from_chapter: i64,
    pub to_event: String,
    pub to_chapter: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NarrativeAnalysis {
    pub mapping_count: usize,
    pub score: f64,
    pub linearity: Linearity,
    pub presentation_counts: BTreeMap<&'static str, usize>,
    pub backward_jumps: Vec<BackwardJump>,
}

/// Analyze mappings already in reading order. Fewer than two mappings
/// have no transitions and count as fully linear.
pub(crate) fn analyze_narrative(mappings: &[EventMapping]) -> NarrativeAnalysis {
    let mut presentation_counts = BTreeMap::new();
    for mapping in mappings {
        *presentation_counts
            .entry(mapping.presentation_type.as_str())
            .or_insert(0) += 1;
    }

    let mut forward = 0usize;
    let mut backward_jumps = Vec::new();
    for pair in mappings.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.chronological_order >= prev.chronological_order {
            forward += 1;
        } else {
            backward_jumps.push(BackwardJump {
                from_event: prev.event_name.clone(),
                from_chapter: prev.chapter_number,
                to_event: next.event_name.clone(),
                to_chapter: next.chapter_number,
            });
        }
    }

    let transitions = mappings.len().saturating_sub(1);
    let score = if transitions == 0 {
        1.0
    } else {
        forward as f64 / transitions as f64
    };

    NarrativeAnalysis {
        mapping_count: mappings.len(),
        score,
        linearity: Linearity::from_score(score),
        presentation_counts,
        backward_jumps,
    }
}

fn format_narrative(book_id: i64, analysis: &NarrativeAnalysis) -> String {
    let mut text = format!(
        "Narrative structure of book {}: {} mapped event(s)\nLinearity: {:.2} ({})\n\nPresentation types:",
        book_id,
        analysis.mapping_count,
        analysis.score,
        analysis.linearity.as_str()
    );
    for (presentation, count) in &analysis.presentation_counts {
        text.push_str(&format!("\n- {}: {}", presentation, count));
    }

    text.push_str("\n\nBackward jumps:");
    if analysis.backward_jumps.is_empty() {
        text.push_str(" None");
    }
    for jump in &analysis.backward_jumps {
        text.push_str(&format!(
            "\n- chapter {} '{}' -> chapter {} '{}'",
            jump.from_chapter, jump.from_event, jump.to_chapter, jump.to_event
        ));
    }
    text
}

// =============================================================================
// Timeline Tools
// =============================================================================

#[derive(Clone)]
pub struct TimelineTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_event(event: &TimelineEvent) -> String {
    format!(
        "Event #{}: {}\nSeries: {}\nOrder: {}\nDate: {}\nSignificance: {}\nDescription: {}",
        event.id,
        event.event_name,
        event.series_id,
        event.chronological_order,
        or_not_set(event.event_date.as_deref()),
        event.significance,
        or_not_set(event.description.as_deref())
    )
}

fn format_mapping(mapping: &EventMapping) -> String {
    format!(
        "Mapping #{}: '{}' (event {}, order {}) in chapter {} (id {}, book {}), scene {}\nPresentation: {}, {}\nPOV: {}\nFunction: {}",
        mapping.id,
        mapping.event_name,
        mapping.event_id,
        mapping.chronological_order,
        mapping.chapter_number,
        mapping.chapter_id,
        mapping.book_id,
        or_not_set(mapping.scene_number),
        mapping.presentation_type,
        mapping.completeness,
        or_not_set(mapping.pov_character.as_deref()),
        or_not_set(mapping.narrative_function.as_deref())
    )
}

#[tool_router]
impl<D: Database + 'static> TimelineTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Create an in-world timeline event for a series.")]
    pub async fn create_timeline_event(
        &self,
        Parameters(params): Parameters<CreateTimelineEventParams>,
    ) -> Result<CallToolResult, McpError> {
        let event = self
            .db
            .timeline()
            .create_event(&NewTimelineEvent {
                series_id: params.series_id,
                event_name: params.event_name,
                event_date: params.event_date,
                description: params.description,
                chronological_order: params.chronological_order,
                significance: params.significance.unwrap_or_default(),
            })
            .await
            .map_err(map_fk_error(
                "Failed to create timeline event",
                "Invalid series: not found",
            ))?;

        text_result(format!("Created timeline event\n\n{}", format_event(&event)))
    }

    #[tool(description = "List a series' timeline events in chronological order.")]
    pub async fn list_timeline_events(
        &self,
        Parameters(params): Parameters<ListTimelineEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        let events = self
            .db
            .timeline()
            .list_events(params.series_id)
            .await
            .map_err(map_db_error("Failed to list timeline events"))?;

        if events.is_empty() {
            return text_result(format!(
                "No timeline events found for series {}.",
                params.series_id
            ));
        }

        let mut text = format!("Timeline of series {}:\n", params.series_id);
        for event in &events {
            text.push_str(&format!(
                "\n{}. {} (id {}, {}), {}",
                event.chronological_order,
                event.event_name,
                event.id,
                event.significance,
                or_not_set(event.event_date.as_deref())
            ));
        }
        text_result(text)
    }

    #[tool(description = "Record that a chapter shows a timeline event, and how.")]
    pub async fn map_event_to_chapter(
        &self,
        Parameters(params): Parameters<MapEventToChapterParams>,
    ) -> Result<CallToolResult, McpError> {
        let mapping = self
            .db
            .timeline()
            .create_mapping(&NewEventMapping {
                event_id: params.event_id,
                chapter_id: params.chapter_id,
                scene_number: params.scene_number,
                presentation_type: params.presentation_type.unwrap_or_default(),
                pov_character: params.pov_character,
                completeness: params.completeness.unwrap_or_default(),
                narrative_function: params.narrative_function,
            })
            .await
            .map_err(map_fk_error(
                "Failed to map event to chapter",
                "Invalid event or chapter: not found",
            ))?;

        text_result(format!("Mapped event to chapter\n\n{}", format_mapping(&mapping)))
    }

    #[tool(description = "Update an event mapping. Only the provided fields change.")]
    pub async fn update_event_mapping(
        &self,
        Parameters(params): Parameters<UpdateEventMappingParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = EventMappingUpdate {
            scene_number: params.scene_number,
            presentation_type: params.presentation_type,
            pov_character: params.pov_character,
            completeness: params.completeness,
            narrative_function: params.narrative_function,
        };

        let mapping = self
            .db
            .timeline()
            .update_mapping(params.mapping_id, &update)
            .await
            .map_err(map_db_error("Failed to update event mapping"))?;

        text_result(format!("Updated event mapping\n\n{}", format_mapping(&mapping)))
    }

    #[tool(description = "Delete an event mapping.")]
    pub async fn delete_event_mapping(
        &self,
        Parameters(params): Parameters<DeleteEventMappingParams>,
    ) -> Result<CallToolResult, McpError> {
        let mapping = self
            .db
            .timeline()
            .delete_mapping(params.mapping_id)
            .await
            .map_err(map_db_error("Failed to delete event mapping"))?;

        text_result(format!(
            "Deleted mapping #{} of '{}' from chapter {}",
            mapping.id, mapping.event_name, mapping.chapter_number
        ))
    }

    #[tool(description = "List event mappings for an event or a chapter.")]
    pub async fn get_event_mappings(
        &self,
        Parameters(params): Parameters<GetEventMappingsParams>,
    ) -> Result<CallToolResult, McpError> {
        let mappings = self
            .db
            .timeline()
            .list_mappings(&MappingQuery {
                event_id: params.event_id,
                chapter_id: params.chapter_id,
            })
            .await
            .map_err(map_db_error("Failed to get event mappings"))?;

        if mappings.is_empty() {
            return text_result("No event mappings found.");
        }

        let text = mappings
            .iter()
            .map(format_mapping)
            .collect::<Vec<_>>()
            .join("\n\n");
        text_result(format!("Found {} mapping(s):\n\n{}", mappings.len(), text))
    }

    #[tool(
        description = "Compare a book's reading order with story chronology: linearity score, presentation types and backward jumps."
    )]
    pub async fn analyze_narrative_structure(
        &self,
        Parameters(params): Parameters<AnalyzeNarrativeStructureParams>,
    ) -> Result<CallToolResult, McpError> {
        let mappings = self
            .db
            .timeline()
            .book_mappings(params.book_id)
            .await
            .map_err(map_db_error("Failed to analyze narrative structure"))?;

        if mappings.is_empty() {
            return text_result(format!(
                "No timeline events are mapped into book {} yet.",
                params.book_id
            ));
        }

        text_result(format_narrative(
            params.book_id,
            &analyze_narrative(&mappings),
        ))
    }
}

impl<D: Database + 'static> RoutedTools for TimelineTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
