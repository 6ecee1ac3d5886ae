//! Domain models for the manuscript database.
//!
//! These models are storage-agnostic and represent the core entities
//! used throughout the application. `New*` structs carry the fields of an
//! insert; `*Update` structs carry a partial update where `None` means
//! "leave unchanged" and, for nullable columns, `Some(None)` means "clear".

use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Declares a closed set of lowercase string values stored in a TEXT column.
///
/// Generates the enum with serde/schemars derives, `as_str`, `Display`,
/// `FromStr` and the `ALL` list used by validation messages.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $first:ident => $first_str:literal
            $(, $variant:ident => $variant_str:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
        pub enum $name {
            #[default]
            #[serde(rename = $first_str)]
            $first,
            $(
                #[serde(rename = $variant_str)]
                $variant,
            )*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$name::$first $(, $name::$variant)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $name::$first => $first_str,
                    $($name::$variant => $variant_str,)*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $first_str => Ok($name::$first),
                    $($variant_str => Ok($name::$variant),)*
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

// =============================================================================
// Status and category enums
// =============================================================================

text_enum! {
    /// Publication lifecycle of a series.
    SeriesStatus {
        Planning => "planning",
        Ongoing => "ongoing",
        Completed => "completed",
        Hiatus => "hiatus",
    }
}

text_enum! {
    /// Writing lifecycle of a book.
    BookStatus {
        Planned => "planned",
        Outlined => "outlined",
        Drafting => "drafting",
        Revising => "revising",
        Complete => "complete",
        Published => "published",
    }
}

text_enum! {
    /// Writing lifecycle of a chapter.
    ChapterStatus {
        Planned => "planned",
        Drafted => "drafted",
        Revised => "revised",
        Final => "final",
    }
}

text_enum! {
    /// How a location figures in a chapter.
    PresenceType {
        Setting => "setting",
        Mentioned => "mentioned",
        Flashback => "flashback",
    }
}

text_enum! {
    /// Kinds of rows kept in the shared lookup table.
    OptionType {
        Genre => "genre",
        RelationshipType => "relationship_type",
        PlotThreadType => "plot_thread_type",
        PlotThreadStatus => "plot_thread_status",
    }
}

text_enum! {
    TropeCategory {
        Plot => "plot",
        Romance => "romance",
        Character => "character",
        Setting => "setting",
        Theme => "theme",
    }
}

text_enum! {
    /// Where a trope scene usually lands in the arc.
    ScenePlacement {
        Early => "early",
        Middle => "middle",
        Climax => "climax",
        Resolution => "resolution",
    }
}

text_enum! {
    CompletionStatus {
        Planned => "planned",
        InProgress => "in_progress",
        Complete => "complete",
        Subverted => "subverted",
    }
}

text_enum! {
    EventSignificance {
        Moderate => "moderate",
        Minor => "minor",
        Major => "major",
        Pivotal => "pivotal",
    }
}

text_enum! {
    /// How a timeline event is shown to the reader in a chapter.
    PresentationType {
        Direct => "direct",
        Flashback => "flashback",
        Flashforward => "flashforward",
        Reference => "reference",
        Retelling => "retelling",
    }
}

text_enum! {
    Completeness {
        Full => "full",
        Partial => "partial",
        Mentioned => "mentioned",
    }
}

// =============================================================================
// Query Types for Pagination
// =============================================================================

/// Base pagination options - composed into entity-specific queries.
#[derive(Debug, Clone, Default)]
pub struct PageSort {
    /// Maximum number of items to return.
    pub limit: Option<usize>,
    /// Number of items to skip.
    pub offset: Option<usize>,
}

/// Query for Series - pagination + author filter.
#[derive(Debug, Clone, Default)]
pub struct SeriesQuery {
    pub page: PageSort,
    pub author_id: Option<i64>,
}

/// Query for Books - pagination + series/status filters.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub page: PageSort,
    pub series_id: Option<i64>,
    pub status: Option<BookStatus>,
}

/// Result of a paginated list query.
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total count of all matching items (before pagination).
    pub total: usize,
    /// Limit that was applied.
    pub limit: Option<usize>,
    /// Offset that was applied.
    pub offset: usize,
}

/// Row identifier type used for all entities.
pub type Id = i64;

// =============================================================================
// Authors and series
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Id,
    pub name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthorUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub bio: Option<Option<String>>,
}

/// A series of books by one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: Id,
    pub author_id: Id,
    pub author_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub start_year: Option<i64>,
    pub status: SeriesStatus,
    /// Number of books currently in the series.
    pub book_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeries {
    pub author_id: Id,
    pub title: String,
    pub description: Option<String>,
    pub start_year: Option<i64>,
    pub status: SeriesStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesUpdate {
    pub author_id: Option<Id>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_year: Option<Option<i64>>,
    pub status: Option<SeriesStatus>,
}

// =============================================================================
// Books, chapters and scenes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: Id,
    pub series_id: Id,
    pub title: String,
    pub book_number: Option<i64>,
    pub status: BookStatus,
    pub target_word_count: Option<i64>,
    pub actual_word_count: i64,
    pub publication_year: Option<i64>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub series_id: Id,
    pub title: String,
    pub book_number: Option<i64>,
    pub status: BookStatus,
    pub target_word_count: Option<i64>,
    pub publication_year: Option<i64>,
    pub description: Option<String>,
    pub isbn: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub book_number: Option<Option<i64>>,
    pub status: Option<BookStatus>,
    pub target_word_count: Option<Option<i64>>,
    pub actual_word_count: Option<i64>,
    pub publication_year: Option<Option<i64>>,
    pub description: Option<Option<String>>,
    pub isbn: Option<Option<String>>,
}

/// Outcome of deleting a book: the removed row and what cascaded with it.
#[derive(Debug, Clone)]
pub struct BookDeletion {
    pub book: Book,
    pub chapter_count: i64,
    pub scene_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Id,
    pub book_id: Id,
    pub chapter_number: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub word_count: i64,
    pub status: ChapterStatus,
    pub pov_character: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewChapter {
    pub book_id: Id,
    pub chapter_number: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub status: ChapterStatus,
    pub pov_character: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterUpdate {
    pub chapter_number: Option<i64>,
    pub title: Option<Option<String>>,
    pub summary: Option<Option<String>>,
    pub word_count: Option<i64>,
    pub status: Option<ChapterStatus>,
    pub pov_character: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Outcome of deleting a chapter: the removed row and what cascaded with it.
#[derive(Debug, Clone)]
pub struct ChapterDeletion {
    pub chapter: Chapter,
    pub scene_count: i64,
    pub presence_count: i64,
}

/// One entry of a chapter renumbering request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChapterOrder {
    pub chapter_id: Id,
    pub new_chapter_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: Id,
    pub chapter_id: Id,
    pub scene_number: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub word_count: i64,
    pub pov_character: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewScene {
    pub chapter_id: Id,
    pub scene_number: i64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub word_count: Option<i64>,
    pub pov_character: Option<String>,
}

// =============================================================================
// Locations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: Id,
    pub series_id: Id,
    pub parent_location_id: Option<Id>,
    pub name: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub notable_features: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewLocation {
    pub series_id: Id,
    pub parent_location_id: Option<Id>,
    pub name: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub notable_features: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub parent_location_id: Option<Option<Id>>,
    pub name: Option<String>,
    pub location_type: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub notable_features: Option<Option<String>>,
}

/// A chapter in which a location appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationAppearance {
    pub chapter_id: Id,
    pub chapter_number: i64,
    pub book_title: String,
    pub presence_type: PresenceType,
    pub notes: Option<String>,
}

/// A location together with its direct children and chapter appearances.
#[derive(Debug, Clone)]
pub struct LocationDetail {
    pub location: Location,
    pub parent_name: Option<String>,
    pub children: Vec<Location>,
    pub appearances: Vec<LocationAppearance>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPresence {
    pub chapter_id: Id,
    pub location_id: Id,
    pub presence_type: PresenceType,
    pub notes: Option<String>,
}

// =============================================================================
// Metadata and lookup options
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOption {
    pub id: Id,
    pub option_type: OptionType,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewLookupOption {
    pub option_type: OptionType,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LookupOptionUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// What a delete of a lookup option actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRemoval {
    Deactivated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenreAssignment {
    pub genre_id: Id,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookGenre {
    pub genre_id: Id,
    pub name: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMetadata {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: String,
}

// =============================================================================
// Tropes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trope {
    pub id: Id,
    pub series_id: Id,
    pub name: String,
    pub category: TropeCategory,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TropeSceneType {
    pub id: Id,
    pub trope_id: Id,
    pub scene_function: String,
    pub scene_description: Option<String>,
    pub typical_placement: Option<ScenePlacement>,
    pub required: bool,
    pub sequence_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewTrope {
    pub series_id: Id,
    pub name: String,
    pub category: TropeCategory,
    pub description: Option<String>,
    pub scene_types: Vec<NewTropeSceneType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NewTropeSceneType {
    /// What the scene does for the trope (e.g. "meet-cute", "betrayal reveal")
    pub scene_function: String,
    pub scene_description: Option<String>,
    pub typical_placement: Option<ScenePlacement>,
    #[serde(default)]
    pub required: bool,
}

/// A trope with its ordered scene types.
#[derive(Debug, Clone)]
pub struct TropeDetail {
    pub trope: Trope,
    pub scene_types: Vec<TropeSceneType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TropeInstance {
    pub id: Id,
    pub trope_id: Id,
    pub book_id: Id,
    pub instance_notes: Option<String>,
    pub subversion_notes: Option<String>,
    pub completion_status: CompletionStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewTropeInstance {
    pub trope_id: Id,
    pub book_id: Id,
    pub instance_notes: Option<String>,
    pub subversion_notes: Option<String>,
    pub completion_status: CompletionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TropeScene {
    pub id: Id,
    pub instance_id: Id,
    pub scene_type_id: Id,
    pub chapter_id: Option<Id>,
    pub scene_id: Option<Id>,
    pub scene_summary: Option<String>,
    pub effectiveness_rating: Option<i64>,
    pub variation_notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTropeScene {
    pub instance_id: Id,
    pub scene_type_id: Id,
    pub chapter_id: Option<Id>,
    pub scene_id: Option<Id>,
    pub scene_summary: Option<String>,
    pub effectiveness_rating: Option<i64>,
    pub variation_notes: Option<String>,
}

/// Result of tracking a trope scene, including the recomputed instance state.
#[derive(Debug, Clone)]
pub struct TrackedTropeScene {
    pub scene: TropeScene,
    pub completion_status: CompletionStatus,
    pub required_covered: usize,
    pub required_total: usize,
}

/// Everything recorded for one trope across a series, as fetched for analysis.
#[derive(Debug, Clone)]
pub struct TropeUsage {
    pub trope: Trope,
    pub scene_types: Vec<TropeSceneType>,
    pub instances: Vec<(TropeInstance, Vec<TropeScene>)>,
}

// =============================================================================
// Timeline
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Id,
    pub series_id: Id,
    pub event_name: String,
    pub event_date: Option<String>,
    pub description: Option<String>,
    pub chronological_order: i64,
    pub significance: EventSignificance,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewTimelineEvent {
    pub series_id: Id,
    pub event_name: String,
    pub event_date: Option<String>,
    pub description: Option<String>,
    pub chronological_order: i64,
    pub significance: EventSignificance,
}

/// A timeline event placed in a chapter, joined with both sides' ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMapping {
    pub id: Id,
    pub event_id: Id,
    pub event_name: String,
    pub chronological_order: i64,
    pub chapter_id: Id,
    pub chapter_number: i64,
    pub book_id: Id,
    pub scene_number: Option<i64>,
    pub presentation_type: PresentationType,
    pub pov_character: Option<String>,
    pub completeness: Completeness,
    pub narrative_function: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEventMapping {
    pub event_id: Id,
    pub chapter_id: Id,
    pub scene_number: Option<i64>,
    pub presentation_type: PresentationType,
    pub pov_character: Option<String>,
    pub completeness: Completeness,
    pub narrative_function: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventMappingUpdate {
    pub scene_number: Option<Option<i64>>,
    pub presentation_type: Option<PresentationType>,
    pub pov_character: Option<Option<String>>,
    pub completeness: Option<Completeness>,
    pub narrative_function: Option<Option<String>>,
}

/// Filter for mapping lookups; at least one side must be given.
#[derive(Debug, Clone, Default)]
pub struct MappingQuery {
    pub event_id: Option<Id>,
    pub chapter_id: Option<Id>,
}
