//! Repository traits for data access abstraction.
//!
//! These traits define the contract for data access, allowing different
//! storage backends to be swapped without changing business logic.
//! Every method returns a `Send` future so tool handlers can run on any
//! runtime worker.

use std::future::Future;

use serde::Serialize;

use crate::db::{
    DbResult,
    models::{
        Author, AuthorUpdate, Book, BookDeletion, BookGenre, BookQuery, BookUpdate, Chapter,
        ChapterDeletion, ChapterOrder, ChapterUpdate, EventMapping, EventMappingUpdate,
        GenreAssignment, Id, ListResult, Location, LocationDetail, LocationUpdate, LookupOption,
        LookupOptionUpdate, MappingQuery, NewAuthor, NewBook, NewChapter, NewEventMapping,
        NewLocation, NewLookupOption, NewPresence, NewScene, NewSeries, NewTimelineEvent,
        NewTrope, NewTropeInstance, NewTropeScene, OptionRemoval, OptionType, PageSort, Scene,
        Series, SeriesMetadata, SeriesQuery, SeriesUpdate, TimelineEvent, TrackedTropeScene,
        TropeCategory, TropeDetail, TropeInstance, TropeUsage,
    },
};

/// Repository for Author operations.
pub trait AuthorRepository {
    fn create(&self, author: &NewAuthor) -> impl Future<Output = DbResult<Author>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<Author>> + Send;

    fn list(&self, page: &PageSort) -> impl Future<Output = DbResult<ListResult<Author>>> + Send;

    /// Apply a partial update; fails with `NoFieldsToUpdate` when nothing is set.
    fn update(&self, id: Id, update: &AuthorUpdate)
    -> impl Future<Output = DbResult<Author>> + Send;

    /// Delete an author. Fails with a foreign-key error while series reference it.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<Author>> + Send;
}

/// Repository for Series operations.
pub trait SeriesRepository {
    fn create(&self, series: &NewSeries) -> impl Future<Output = DbResult<Series>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<Series>> + Send;

    fn list(
        &self,
        query: &SeriesQuery,
    ) -> impl Future<Output = DbResult<ListResult<Series>>> + Send;

    fn update(&self, id: Id, update: &SeriesUpdate)
    -> impl Future<Output = DbResult<Series>> + Send;

    /// Delete a series. Fails with a foreign-key error while books reference it.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<Series>> + Send;
}

/// Repository for Book operations.
pub trait BookRepository {
    /// Create a book, rejecting a duplicate `book_number` within the series.
    fn create(&self, book: &NewBook) -> impl Future<Output = DbResult<Book>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<Book>> + Send;

    fn list(&self, query: &BookQuery) -> impl Future<Output = DbResult<ListResult<Book>>> + Send;

    fn update(&self, id: Id, update: &BookUpdate) -> impl Future<Output = DbResult<Book>> + Send;

    /// Delete a book; chapters and scenes go with it through cascading deletes.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<BookDeletion>> + Send;
}

/// Repository for Chapter and Scene operations.
pub trait ChapterRepository {
    /// Create a chapter, rejecting a duplicate `chapter_number` within the book.
    fn create(&self, chapter: &NewChapter) -> impl Future<Output = DbResult<Chapter>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<Chapter>> + Send;

    /// All chapters of a book ordered by chapter number.
    fn list_by_book(&self, book_id: Id) -> impl Future<Output = DbResult<Vec<Chapter>>> + Send;

    fn update(
        &self,
        id: Id,
        update: &ChapterUpdate,
    ) -> impl Future<Output = DbResult<Chapter>> + Send;

    /// Delete a chapter; scenes and presence rows go with it.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<ChapterDeletion>> + Send;

    /// Renumber chapters of one book atomically.
    fn reorder(
        &self,
        book_id: Id,
        order: &[ChapterOrder],
    ) -> impl Future<Output = DbResult<Vec<Chapter>>> + Send;

    fn create_scene(&self, scene: &NewScene) -> impl Future<Output = DbResult<Scene>> + Send;

    fn list_scenes(&self, chapter_id: Id) -> impl Future<Output = DbResult<Vec<Scene>>> + Send;
}

/// Repository for Location operations.
pub trait LocationRepository {
    fn create(&self, location: &NewLocation) -> impl Future<Output = DbResult<Location>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<LocationDetail>> + Send;

    fn list(
        &self,
        series_id: Id,
        location_type: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<Location>>> + Send;

    fn update(
        &self,
        id: Id,
        update: &LocationUpdate,
    ) -> impl Future<Output = DbResult<Location>> + Send;

    fn delete(&self, id: Id) -> impl Future<Output = DbResult<Location>> + Send;

    /// Record that a location appears in a chapter. Returns the presence row id.
    fn add_presence(&self, presence: &NewPresence) -> impl Future<Output = DbResult<Id>> + Send;
}

/// Repository for lookup options, genre assignment and series metadata.
pub trait MetadataRepository {
    fn list_options(
        &self,
        option_type: OptionType,
        include_inactive: bool,
    ) -> impl Future<Output = DbResult<Vec<LookupOption>>> + Send;

    fn get_option(&self, id: Id) -> impl Future<Output = DbResult<LookupOption>> + Send;

    fn create_option(
        &self,
        option: &NewLookupOption,
    ) -> impl Future<Output = DbResult<LookupOption>> + Send;

    fn update_option(
        &self,
        id: Id,
        update: &LookupOptionUpdate,
    ) -> impl Future<Output = DbResult<LookupOption>> + Send;

    /// Soft delete flips `is_active`; hard delete removes the row.
    fn delete_option(
        &self,
        id: Id,
        soft_delete: bool,
    ) -> impl Future<Output = DbResult<OptionRemoval>> + Send;

    /// Replace the genre set of a book atomically.
    fn assign_book_genres(
        &self,
        book_id: Id,
        genres: &[GenreAssignment],
    ) -> impl Future<Output = DbResult<Vec<BookGenre>>> + Send;

    fn book_genres(&self, book_id: Id) -> impl Future<Output = DbResult<Vec<BookGenre>>> + Send;

    fn set_series_metadata(
        &self,
        series_id: Id,
        key: &str,
        value: Option<&str>,
    ) -> impl Future<Output = DbResult<SeriesMetadata>> + Send;

    fn series_metadata(
        &self,
        series_id: Id,
        key: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<SeriesMetadata>>> + Send;
}

/// Repository for tropes, their instances in books and tracked scenes.
pub trait TropeRepository {
    /// Create a trope together with its scene types.
    fn create(&self, trope: &NewTrope) -> impl Future<Output = DbResult<TropeDetail>> + Send;

    fn get(&self, id: Id) -> impl Future<Output = DbResult<TropeDetail>> + Send;

    fn list(
        &self,
        series_id: Id,
        category: Option<TropeCategory>,
    ) -> impl Future<Output = DbResult<Vec<TropeDetail>>> + Send;

    fn create_instance(
        &self,
        instance: &NewTropeInstance,
    ) -> impl Future<Output = DbResult<TropeInstance>> + Send;

    /// Record a scene for an instance and recompute its completion status.
    fn track_scene(
        &self,
        scene: &NewTropeScene,
    ) -> impl Future<Output = DbResult<TrackedTropeScene>> + Send;

    /// Fetch everything needed to analyze trope usage in a series.
    fn usage(&self, series_id: Id) -> impl Future<Output = DbResult<Vec<TropeUsage>>> + Send;
}

/// Repository for timeline events and their chapter mappings.
pub trait TimelineRepository {
    fn create_event(
        &self,
        event: &NewTimelineEvent,
    ) -> impl Future<Output = DbResult<TimelineEvent>> + Send;

    fn list_events(
        &self,
        series_id: Id,
    ) -> impl Future<Output = DbResult<Vec<TimelineEvent>>> + Send;

    fn create_mapping(
        &self,
        mapping: &NewEventMapping,
    ) -> impl Future<Output = DbResult<EventMapping>> + Send;

    fn update_mapping(
        &self,
        id: Id,
        update: &EventMappingUpdate,
    ) -> impl Future<Output = DbResult<EventMapping>> + Send;

    fn delete_mapping(&self, id: Id) -> impl Future<Output = DbResult<EventMapping>> + Send;

    fn list_mappings(
        &self,
        query: &MappingQuery,
    ) -> impl Future<Output = DbResult<Vec<EventMapping>>> + Send;

    /// All mappings into a book's chapters, in reading order.
    fn book_mappings(
        &self,
        book_id: Id,
    ) -> impl Future<Output = DbResult<Vec<EventMapping>>> + Send;
}

/// Outcome of a connectivity check. Never an error: failures land in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub timestamp: Option<String>,
    pub error: Option<String>,
}

/// Combined database interface.
///
/// Provides access to repositories via associated types, avoiding dynamic dispatch.
pub trait Database: Send + Sync {
    type Authors<'a>: AuthorRepository + Send + Sync
    where
        Self: 'a;
    type Series<'a>: SeriesRepository + Send + Sync
    where
        Self: 'a;
    type Books<'a>: BookRepository + Send + Sync
    where
        Self: 'a;
    type Chapters<'a>: ChapterRepository + Send + Sync
    where
        Self: 'a;
    type Locations<'a>: LocationRepository + Send + Sync
    where
        Self: 'a;
    type Metadata<'a>: MetadataRepository + Send + Sync
    where
        Self: 'a;
    type Tropes<'a>: TropeRepository + Send + Sync
    where
        Self: 'a;
    type Timeline<'a>: TimelineRepository + Send + Sync
    where
        Self: 'a;

    /// Run pending migrations.
    fn migrate(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Check connectivity with a trivial query.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;

    fn authors(&self) -> Self::Authors<'_>;

    fn series(&self) -> Self::Series<'_>;

    fn books(&self) -> Self::Books<'_>;

    fn chapters(&self) -> Self::Chapters<'_>;

    fn locations(&self) -> Self::Locations<'_>;

    fn metadata(&self) -> Self::Metadata<'_>;

    fn tropes(&self) -> Self::Tropes<'_>;

    fn timeline(&self) -> Self::Timeline<'_>;
}
