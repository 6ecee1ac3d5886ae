//! MCP tools for Trope management and trope pattern analysis.

use rmcp::{
    ErrorData as McpError,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::CallToolResult,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::db::{
    CompletionStatus, Database, NewTrope, NewTropeInstance, NewTropeScene, NewTropeSceneType,
    TropeCategory, TropeDetail, TropeRepository, TropeUsage,
};
use crate::mcp::tools::{RoutedTools, map_db_error, map_fk_error, or_not_set, percent, text_result};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListTropesParams {
    #[schemars(description = "Series ID whose tropes to list")]
    pub series_id: i64,
    #[schemars(
        description = "Filter by category: 'plot', 'romance', 'character', 'setting', 'theme' (optional)"
    )]
    pub category: Option<TropeCategory>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetTropeParams {
    #[schemars(description = "Trope ID")]
    pub trope_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTropeParams {
    #[schemars(description = "Series ID the trope is tracked in")]
    pub series_id: i64,
    #[schemars(description = "Trope name, unique within the series, e.g. 'Enemies to Lovers'")]
    pub name: String,
    #[schemars(description = "Category (default: 'plot')")]
    pub category: Option<TropeCategory>,
    #[schemars(description = "Description (optional)")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(
        description = "Scene types that make up the trope, in story order. Mark the essential ones as required."
    )]
    pub scene_types: Vec<NewTropeSceneType>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateTropeInstanceParams {
    #[schemars(description = "Trope ID")]
    pub trope_id: i64,
    #[schemars(description = "Book ID using the trope. Must be in the trope's series.")]
    pub book_id: i64,
    #[schemars(description = "How the trope plays out in this book (optional)")]
    pub instance_notes: Option<String>,
    #[schemars(description = "How the book subverts the trope (optional)")]
    pub subversion_notes: Option<String>,
    #[schemars(
        description = "Status: 'planned' (default), 'in_progress', 'complete', 'subverted'"
    )]
    pub completion_status: Option<CompletionStatus>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TrackTropeSceneParams {
    #[schemars(description = "Trope instance ID")]
    pub instance_id: i64,
    #[schemars(description = "Scene type ID of the instance's trope")]
    pub scene_type_id: i64,
    #[schemars(description = "Chapter ID in the instance's book (optional)")]
    pub chapter_id: Option<i64>,
    #[schemars(description = "Scene ID inside that chapter (optional)")]
    pub scene_id: Option<i64>,
    #[schemars(description = "What happens in the scene (optional)")]
    pub scene_summary: Option<String>,
    #[schemars(description = "How well the scene lands, 1 to 10 (optional)")]
    pub effectiveness_rating: Option<i64>,
    #[schemars(description = "How this scene varies the usual pattern (optional)")]
    pub variation_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeTropePatternsParams {
    #[schemars(description = "Series ID to analyze")]
    pub series_id: i64,
}

// =============================================================================
// Analysis
// =============================================================================

/// How completely a trope's scene types are covered across its instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Development {
    WellDeveloped,
    PartiallyDeveloped,
    Underdeveloped,
}

impl Development {
    pub(crate) fn from_coverage(coverage: f64) -> Self {
        if coverage >= 80.0 {
            Development::WellDeveloped
        } else if coverage >= 40.0 {
            Development::PartiallyDeveloped
        } else {
            Development::Underdeveloped
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Development::WellDeveloped => "well-developed",
            Development::PartiallyDeveloped => "partially developed",
            Development::Underdeveloped => "underdeveloped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TropeReport {
    pub name: String,
    pub category: TropeCategory,
    pub instance_count: usize,
    pub covered_scene_types: usize,
    pub total_scene_types: usize,
    pub coverage: f64,
    pub average_effectiveness: Option<f64>,
    pub development: Development,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TropeAnalysis {
    pub reports: Vec<TropeReport>,
    /// category -> (trope count, instance count)
    pub categories: BTreeMap<&'static str, (usize, usize)>,
}

pub(crate) fn analyze_tropes(usage: &[TropeUsage]) -> TropeAnalysis {
    let mut analysis = TropeAnalysis::default();

    for trope in usage {
        let covered: HashSet<i64> = trope
            .instances
            .iter()
            .flat_map(|(_, scenes)| scenes.iter().map(|s| s.scene_type_id))
            .collect();
        let ratings: Vec<i64> = trope
            .instances
            .iter()
            .flat_map(|(_, scenes)| scenes.iter().filter_map(|s| s.effectiveness_rating))
            .collect();

        let total_scene_types = trope.scene_types.len();
        let coverage = percent(covered.len(), total_scene_types);
        let average_effectiveness = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64)
        };

        let entry = analysis
            .categories
            .entry(trope.trope.category.as_str())
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += trope.instances.len();

        analysis.reports.push(TropeReport {
            name: trope.trope.name.clone(),
            category: trope.trope.category,
            instance_count: trope.instances.len(),
            covered_scene_types: covered.len(),
            total_scene_types,
            coverage,
            average_effectiveness,
            development: Development::from_coverage(coverage),
        });
    }

    analysis
}

fn format_analysis(series_id: i64, analysis: &TropeAnalysis) -> String {
    let instances: usize = analysis.reports.iter().map(|r| r.instance_count).sum();
    let mut text = format!(
        "Trope analysis for series {}: {} trope(s), {} instance(s)\n",
        series_id,
        analysis.reports.len(),
        instances
    );

    for report in &analysis.reports {
        text.push_str(&format!(
            "\n- {} [{}]: {} instance(s), {:.0}% scene coverage ({}/{} scene types), avg effectiveness {} -> {}",
            report.name,
            report.category,
            report.instance_count,
            report.coverage,
            report.covered_scene_types,
            report.total_scene_types,
            or_not_set(report.average_effectiveness.map(|avg| format!("{:.1}", avg))),
            report.development.as_str()
        ));
    }

    text.push_str("\n\nCategories:");
    for (category, (tropes, instances)) in &analysis.categories {
        text.push_str(&format!(
            "\n- {}: {} trope(s), {} instance(s)",
            category, tropes, instances
        ));
    }

    for development in [
        Development::WellDeveloped,
        Development::PartiallyDeveloped,
        Development::Underdeveloped,
    ] {
        let names: Vec<&str> = analysis
            .reports
            .iter()
            .filter(|r| r.development == development)
            .map(|r| r.name.as_str())
            .collect();
        if !names.is_empty() {
            text.push_str(&format!("\n\n{}: {}", development.as_str(), names.join(", ")));
        }
    }

    text
}

// =============================================================================
// Trope Tools
// =============================================================================

#[derive(Clone)]
pub struct TropeTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_trope(detail: &TropeDetail) -> String {
    let trope = &detail.trope;
    let mut text = format!(
        "Trope #{}: {} [{}]\nSeries: {}\nDescription: {}\n\nScene types:",
        trope.id,
        trope.name,
        trope.category,
        trope.series_id,
        or_not_set(trope.description.as_deref())
    );
    if detail.scene_types.is_empty() {
        text.push_str("\nNo scene types defined yet");
    }
    for scene_type in &detail.scene_types {
        text.push_str(&format!(
            "\n{}. {} (id {}){}, placement {}\n   {}",
            scene_type.sequence_order,
            scene_type.scene_function,
            scene_type.id,
            if scene_type.required { ", required" } else { "" },
            or_not_set(scene_type.typical_placement),
            or_not_set(scene_type.scene_description.as_deref())
        ));
    }
    text
}

#[tool_router]
impl<D: Database + 'static> TropeTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List a series' tropes with scene type counts. Filter by category.")]
    pub async fn list_tropes(
        &self,
        Parameters(params): Parameters<ListTropesParams>,
    ) -> Result<CallToolResult, McpError> {
        let tropes = self
            .db
            .tropes()
            .list(params.series_id, params.category)
            .await
            .map_err(map_db_error("Failed to list tropes"))?;

        if tropes.is_empty() {
            return text_result(format!("No tropes found for series {}.", params.series_id));
        }

        let mut text = format!("Found {} trope(s):\n", tropes.len());
        for detail in &tropes {
            let required = detail.scene_types.iter().filter(|st| st.required).count();
            text.push_str(&format!(
                "\n- #{} {} [{}], {} scene type(s), {} required",
                detail.trope.id,
                detail.trope.name,
                detail.trope.category,
                detail.scene_types.len(),
                required
            ));
        }
        text_result(text)
    }

    #[tool(description = "Get a trope with its ordered scene types.")]
    pub async fn get_trope(
        &self,
        Parameters(params): Parameters<GetTropeParams>,
    ) -> Result<CallToolResult, McpError> {
        let detail = self
            .db
            .tropes()
            .get(params.trope_id)
            .await
            .map_err(map_db_error("Failed to get trope"))?;

        text_result(format_trope(&detail))
    }

    #[tool(description = "Create a trope and its scene types in one step.")]
    pub async fn create_trope(
        &self,
        Parameters(params): Parameters<CreateTropeParams>,
    ) -> Result<CallToolResult, McpError> {
        let detail = self
            .db
            .tropes()
            .create(&NewTrope {
                series_id: params.series_id,
                name: params.name,
                category: params.category.unwrap_or_default(),
                description: params.description,
                scene_types: params.scene_types,
            })
            .await
            .map_err(map_fk_error("Failed to create trope", "Invalid series: not found"))?;

        text_result(format!("Created trope\n\n{}", format_trope(&detail)))
    }

    #[tool(description = "Start using a trope in a book.")]
    pub async fn create_trope_instance(
        &self,
        Parameters(params): Parameters<CreateTropeInstanceParams>,
    ) -> Result<CallToolResult, McpError> {
        let instance = self
            .db
            .tropes()
            .create_instance(&NewTropeInstance {
                trope_id: params.trope_id,
                book_id: params.book_id,
                instance_notes: params.instance_notes,
                subversion_notes: params.subversion_notes,
                completion_status: params.completion_status.unwrap_or_default(),
            })
            .await
            .map_err(map_db_error("Failed to create trope instance"))?;

        text_result(format!(
            "Created trope instance #{} of trope {} in book {}\nStatus: {}\nNotes: {}\nSubversion: {}",
            instance.id,
            instance.trope_id,
            instance.book_id,
            instance.completion_status,
            or_not_set(instance.instance_notes.as_deref()),
            or_not_set(instance.subversion_notes.as_deref())
        ))
    }

    #[tool(
        description = "Record where a trope scene type happens in a book. Recomputes the instance's completion status."
    )]
    pub async fn track_trope_scene(
        &self,
        Parameters(params): Parameters<TrackTropeSceneParams>,
    ) -> Result<CallToolResult, McpError> {
        let tracked = self
            .db
            .tropes()
            .track_scene(&NewTropeScene {
                instance_id: params.instance_id,
                scene_type_id: params.scene_type_id,
                chapter_id: params.chapter_id,
                scene_id: params.scene_id,
                scene_summary: params.scene_summary,
                effectiveness_rating: params.effectiveness_rating,
                variation_notes: params.variation_notes,
            })
            .await
            .map_err(map_db_error("Failed to track trope scene"))?;

        let scene = &tracked.scene;
        text_result(format!(
            "Tracked scene type {} for trope instance {} (trope scene id {})\nChapter: {}\nScene: {}\nEffectiveness: {}\nSummary: {}\n\nInstance status: {} ({}/{} required scene types covered)",
            scene.scene_type_id,
            scene.instance_id,
            scene.id,
            or_not_set(scene.chapter_id),
            or_not_set(scene.scene_id),
            or_not_set(scene.effectiveness_rating),
            or_not_set(scene.scene_summary.as_deref()),
            tracked.completion_status,
            tracked.required_covered,
            tracked.required_total
        ))
    }

    #[tool(
        description = "Summarize trope usage in a series: instances, scene coverage, effectiveness and development level."
    )]
    pub async fn analyze_trope_patterns(
        &self,
        Parameters(params): Parameters<AnalyzeTropePatternsParams>,
    ) -> Result<CallToolResult, McpError> {
        let usage = self
            .db
            .tropes()
            .usage(params.series_id)
            .await
            .map_err(map_db_error("Failed to analyze trope patterns"))?;

        if usage.is_empty() {
            return text_result(format!(
                "No tropes defined for series {}.",
                params.series_id
            ));
        }

        text_result(format_analysis(params.series_id, &analyze_tropes(&usage)))
    }
}

impl<D: Database + 'static> RoutedTools for TropeTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
