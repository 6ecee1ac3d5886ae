//! SQLite TimelineRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{UpdateBuilder, ensure_exists, parse_column};
use crate::db::{
    DbError, DbResult, EventMapping, EventMappingUpdate, Id, MappingQuery, NewEventMapping,
    NewTimelineEvent, TimelineEvent, TimelineRepository,
};

const SELECT_EVENT: &str = "SELECT id, series_id, event_name, event_date, description, \
     chronological_order, significance, created_at, updated_at FROM timeline_events";

const SELECT_MAPPING: &str = "SELECT m.id, m.event_id, e.event_name, e.chronological_order, \
     m.chapter_id, c.chapter_number, c.book_id, m.scene_number, m.presentation_type, \
     m.pov_character, m.completeness, m.narrative_function \
     FROM event_chapter_mappings m \
     JOIN timeline_events e ON e.id = m.event_id \
     JOIN chapters c ON c.id = m.chapter_id";

/// SQLx-backed timeline repository.
pub struct SqliteTimelineRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn event_from_row(row: &SqliteRow) -> DbResult<TimelineEvent> {
    let significance: String = row.try_get("significance")?;
    Ok(TimelineEvent {
        id: row.try_get("id")?,
        series_id: row.try_get("series_id")?,
        event_name: row.try_get("event_name")?,
        event_date: row.try_get("event_date")?,
        description: row.try_get("description")?,
        chronological_order: row.try_get("chronological_order")?,
        significance: parse_column(&significance)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn mapping_from_row(row: &SqliteRow) -> DbResult<EventMapping> {
    let presentation_type: String = row.try_get("presentation_type")?;
    let completeness: String = row.try_get("completeness")?;
    Ok(EventMapping {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        event_name: row.try_get("event_name")?,
        chronological_order: row.try_get("chronological_order")?,
        chapter_id: row.try_get("chapter_id")?,
        chapter_number: row.try_get("chapter_number")?,
        book_id: row.try_get("book_id")?,
        scene_number: row.try_get("scene_number")?,
        presentation_type: parse_column(&presentation_type)?,
        pov_character: row.try_get("pov_character")?,
        completeness: parse_column(&completeness)?,
        narrative_function: row.try_get("narrative_function")?,
    })
}

impl<'a> SqliteTimelineRepository<'a> {
    async fn get_event(&self, id: Id) -> DbResult<TimelineEvent> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_EVENT))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Timeline event", id))?;

        event_from_row(&row)
    }

    async fn get_mapping(&self, id: Id) -> DbResult<EventMapping> {
        let row = sqlx::query(&format!("{} WHERE m.id = ?", SELECT_MAPPING))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Event mapping", id))?;

        mapping_from_row(&row)
    }
}

impl<'a> TimelineRepository for SqliteTimelineRepository<'a> {
    async fn create_event(&self, event: &NewTimelineEvent) -> DbResult<TimelineEvent> {
        if event.event_name.trim().is_empty() {
            return Err(DbError::validation("Event name cannot be empty"));
        }

        let id = sqlx::query(
            "INSERT INTO timeline_events (series_id, event_name, event_date, description, \
             chronological_order, significance) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.series_id)
        .bind(&event.event_name)
        .bind(&event.event_date)
        .bind(&event.description)
        .bind(event.chronological_order)
        .bind(event.significance.as_str())
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        self.get_event(id).await
    }

    async fn list_events(&self, series_id: Id) -> DbResult<Vec<TimelineEvent>> {
        sqlx::query(&format!(
            "{} WHERE series_id = ? ORDER BY chronological_order ASC, id ASC",
            SELECT_EVENT
        ))
        .bind(series_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(event_from_row)
        .collect()
    }

    async fn create_mapping(&self, mapping: &NewEventMapping) -> DbResult<EventMapping> {
        // Both ends must exist; a missing one surfaces as a foreign-key error
        // from the insert. When both exist they must share a series.
        let sides: Option<(Id, Id)> = sqlx::query_as(
            "SELECT e.series_id, b.series_id FROM timeline_events e, chapters c \
             JOIN books b ON b.id = c.book_id WHERE e.id = ? AND c.id = ?",
        )
        .bind(mapping.event_id)
        .bind(mapping.chapter_id)
        .fetch_optional(self.pool)
        .await?;

        if let Some((event_series, chapter_series)) = sides
            && event_series != chapter_series
        {
            return Err(DbError::validation(format!(
                "Event {} and chapter {} belong to different series",
                mapping.event_id, mapping.chapter_id
            )));
        }

        let id = sqlx::query(
            "INSERT INTO event_chapter_mappings (event_id, chapter_id, scene_number, \
             presentation_type, pov_character, completeness, narrative_function) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mapping.event_id)
        .bind(mapping.chapter_id)
        .bind(mapping.scene_number)
        .bind(mapping.presentation_type.as_str())
        .bind(&mapping.pov_character)
        .bind(mapping.completeness.as_str())
        .bind(&mapping.narrative_function)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        self.get_mapping(id).await
    }

    async fn update_mapping(&self, id: Id, update: &EventMappingUpdate) -> DbResult<EventMapping> {
        UpdateBuilder::new("event_chapter_mappings", "Event mapping")
            .without_timestamp()
            .set("scene_number", update.scene_number)
            .set("presentation_type", update.presentation_type.map(|p| p.as_str()))
            .set("pov_character", update.pov_character.clone())
            .set("completeness", update.completeness.map(|c| c.as_str()))
            .set("narrative_function", update.narrative_function.clone())
            .execute(id, self.pool)
            .await?;

        self.get_mapping(id).await
    }

    async fn delete_mapping(&self, id: Id) -> DbResult<EventMapping> {
        let mapping = self.get_mapping(id).await?;

        sqlx::query("DELETE FROM event_chapter_mappings WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(mapping)
    }

    async fn list_mappings(&self, query: &MappingQuery) -> DbResult<Vec<EventMapping>> {
        let rows = match (query.event_id, query.chapter_id) {
            (None, None) => {
                return Err(DbError::validation(
                    "Either event_id or chapter_id is required",
                ));
            }
            (Some(event_id), Some(chapter_id)) => {
                sqlx::query(&format!(
                    "{} WHERE m.event_id = ? AND m.chapter_id = ? ORDER BY COALESCE(m.scene_number, 0), m.id",
                    SELECT_MAPPING
                ))
                .bind(event_id)
                .bind(chapter_id)
                .fetch_all(self.pool)
                .await?
            }
            (Some(event_id), None) => {
                sqlx::query(&format!(
                    "{} WHERE m.event_id = ? ORDER BY c.book_id, c.chapter_number, COALESCE(m.scene_number, 0), m.id",
                    SELECT_MAPPING
                ))
                .bind(event_id)
                .fetch_all(self.pool)
                .await?
            }
            (None, Some(chapter_id)) => {
                sqlx::query(&format!(
                    "{} WHERE m.chapter_id = ? ORDER BY COALESCE(m.scene_number, 0), e.chronological_order, m.id",
                    SELECT_MAPPING
                ))
                .bind(chapter_id)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.iter().map(mapping_from_row).collect()
    }

    async fn book_mappings(&self, book_id: Id) -> DbResult<Vec<EventMapping>> {
        ensure_exists(self.pool, "books", "Book", book_id).await?;

        sqlx::query(&format!(
            "{} WHERE c.book_id = ? ORDER BY c.chapter_number ASC, COALESCE(m.scene_number, 0) ASC, m.id ASC",
            SELECT_MAPPING
        ))
        .bind(book_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(mapping_from_row)
        .collect()
    }
}
