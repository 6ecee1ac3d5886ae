//! SQLite LocationRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{UpdateBuilder, parse_column};
use crate::db::{
    DbError, DbResult, Id, Location, LocationAppearance, LocationDetail, LocationRepository,
    LocationUpdate, NewLocation, NewPresence,
};

const SELECT_LOCATION: &str = "SELECT id, series_id, parent_location_id, name, location_type, \
     description, notable_features, created_at, updated_at FROM locations";

/// SQLx-backed location repository.
pub struct SqliteLocationRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn location_from_row(row: &SqliteRow) -> DbResult<Location> {
    Ok(Location {
        id: row.try_get("id")?,
        series_id: row.try_get("series_id")?,
        parent_location_id: row.try_get("parent_location_id")?,
        name: row.try_get("name")?,
        location_type: row.try_get("location_type")?,
        description: row.try_get("description")?,
        notable_features: row.try_get("notable_features")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn appearance_from_row(row: &SqliteRow) -> DbResult<LocationAppearance> {
    let presence_type: String = row.try_get("presence_type")?;
    Ok(LocationAppearance {
        chapter_id: row.try_get("chapter_id")?,
        chapter_number: row.try_get("chapter_number")?,
        book_title: row.try_get("book_title")?,
        presence_type: parse_column(&presence_type)?,
        notes: row.try_get("notes")?,
    })
}

fn duplicate_name(name: &str) -> DbError {
    DbError::validation(format!("Location '{}' already exists in this series", name))
}

impl<'a> SqliteLocationRepository<'a> {
    async fn fetch(&self, id: Id) -> DbResult<Location> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_LOCATION))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))?;

        location_from_row(&row)
    }

    /// The parent must exist and live in the same series as the child.
    async fn check_parent(&self, series_id: Id, parent_id: Id) -> DbResult<()> {
        let parent_series: Option<Id> =
            sqlx::query_scalar("SELECT series_id FROM locations WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(self.pool)
                .await?;

        match parent_series {
            None => Err(DbError::ForeignKey {
                message: format!("parent location {} does not exist", parent_id),
            }),
            Some(s) if s != series_id => Err(DbError::validation(
                "Parent location must belong to the same series",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Walks up from `parent_id`; reaching `id` means the move would close a loop.
    async fn check_no_cycle(&self, id: Id, parent_id: Id) -> DbResult<()> {
        let mut cursor = Some(parent_id);
        while let Some(current) = cursor {
            if current == id {
                return Err(DbError::validation(
                    "Parent location would create a cycle in the location hierarchy",
                ));
            }
            cursor = sqlx::query_scalar::<_, Option<Id>>(
                "SELECT parent_location_id FROM locations WHERE id = ?",
            )
            .bind(current)
            .fetch_optional(self.pool)
            .await?
            .flatten();
        }

        Ok(())
    }
}

impl<'a> LocationRepository for SqliteLocationRepository<'a> {
    async fn create(&self, location: &NewLocation) -> DbResult<Location> {
        if location.name.trim().is_empty() {
            return Err(DbError::validation("Location name cannot be empty"));
        }

        if let Some(parent_id) = location.parent_location_id {
            self.check_parent(location.series_id, parent_id).await?;
        }

        let id = sqlx::query(
            "INSERT INTO locations (series_id, parent_location_id, name, location_type, description, notable_features) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(location.series_id)
        .bind(location.parent_location_id)
        .bind(&location.name)
        .bind(&location.location_type)
        .bind(&location.description)
        .bind(&location.notable_features)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => duplicate_name(&location.name),
            other => other,
        })?
        .last_insert_rowid();

        self.fetch(id).await
    }

    async fn get(&self, id: Id) -> DbResult<LocationDetail> {
        let location = self.fetch(id).await?;

        let parent_name = match location.parent_location_id {
            Some(parent_id) => {
                sqlx::query_scalar::<_, String>("SELECT name FROM locations WHERE id = ?")
                    .bind(parent_id)
                    .fetch_optional(self.pool)
                    .await?
            }
            None => None,
        };

        let children = sqlx::query(&format!(
            "{} WHERE parent_location_id = ? ORDER BY name ASC",
            SELECT_LOCATION
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(location_from_row)
        .collect::<DbResult<Vec<_>>>()?;

        let appearances = sqlx::query(
            "SELECT p.chapter_id, c.chapter_number, b.title AS book_title, p.presence_type, p.notes \
             FROM chapter_location_presence p \
             JOIN chapters c ON c.id = p.chapter_id \
             JOIN books b ON b.id = c.book_id \
             WHERE p.location_id = ? \
             ORDER BY b.book_number ASC, c.chapter_number ASC, p.presence_type ASC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(appearance_from_row)
        .collect::<DbResult<Vec<_>>>()?;

        Ok(LocationDetail {
            location,
            parent_name,
            children,
            appearances,
        })
    }

    async fn list(&self, series_id: Id, location_type: Option<&str>) -> DbResult<Vec<Location>> {
        let rows = match location_type {
            Some(kind) => {
                sqlx::query(&format!(
                    "{} WHERE series_id = ? AND location_type = ? ORDER BY name ASC",
                    SELECT_LOCATION
                ))
                .bind(series_id)
                .bind(kind)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE series_id = ? ORDER BY name ASC",
                    SELECT_LOCATION
                ))
                .bind(series_id)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.iter().map(location_from_row).collect()
    }

    async fn update(&self, id: Id, update: &LocationUpdate) -> DbResult<Location> {
        let builder = UpdateBuilder::new("locations", "Location")
            .set("parent_location_id", update.parent_location_id)
            .set("name", update.name.clone())
            .set("location_type", update.location_type.clone())
            .set("description", update.description.clone())
            .set("notable_features", update.notable_features.clone());

        if builder.is_empty() {
            return Err(DbError::NoFieldsToUpdate {
                entity_type: "Location".to_string(),
            });
        }

        if let Some(Some(parent_id)) = update.parent_location_id {
            if parent_id == id {
                return Err(DbError::validation("A location cannot be its own parent"));
            }
            let current = self.fetch(id).await?;
            self.check_parent(current.series_id, parent_id).await?;
            self.check_no_cycle(id, parent_id).await?;
        }

        builder
            .execute(id, self.pool)
            .await
            .map_err(|e| match (e, &update.name) {
                (DbError::UniqueViolation { .. }, Some(name)) => duplicate_name(name),
                (e, _) => e,
            })?;

        self.fetch(id).await
    }

    async fn delete(&self, id: Id) -> DbResult<Location> {
        let location = self.fetch(id).await?;

        // Children are detached (SET NULL); presence rows cascade.
        sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(location)
    }

    async fn add_presence(&self, presence: &NewPresence) -> DbResult<Id> {
        let id = sqlx::query(
            "INSERT INTO chapter_location_presence (chapter_id, location_id, presence_type, notes) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(presence.chapter_id)
        .bind(presence.location_id)
        .bind(presence.presence_type.as_str())
        .bind(&presence.notes)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::validation(format!(
                "Location {} is already tracked in chapter {} as {}",
                presence.location_id, presence.chapter_id, presence.presence_type
            )),
            other => other,
        })?
        .last_insert_rowid();

        Ok(id)
    }
}
