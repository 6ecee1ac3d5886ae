//! SQLite MetadataRepository implementation: lookup options, book genres
//! and free-form series metadata.

use std::collections::HashSet;

use sqlx::sqlite::SqliteRow;
use futures_util::FutureExt;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use super::helpers::{UpdateBuilder, ensure_exists, in_transaction, parse_column};
use crate::db::utils::current_timestamp;
use crate::db::{
    BookGenre, DbError, DbResult, GenreAssignment, Id, LookupOption, LookupOptionUpdate,
    MetadataRepository, NewLookupOption, OptionRemoval, OptionType, SeriesMetadata,
};

const SELECT_OPTION: &str = "SELECT id, option_type, name, description, is_active, created_at, \
     updated_at FROM lookup_options";

/// SQLx-backed metadata repository.
pub struct SqliteMetadataRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn option_from_row(row: &SqliteRow) -> DbResult<LookupOption> {
    let option_type: String = row.try_get("option_type")?;
    Ok(LookupOption {
        id: row.try_get("id")?,
        option_type: parse_column(&option_type)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn metadata_from_row(row: &SqliteRow) -> DbResult<SeriesMetadata> {
    Ok(SeriesMetadata {
        key: row.try_get("metadata_key")?,
        value: row.try_get("metadata_value")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn genre_from_row(row: &SqliteRow) -> DbResult<BookGenre> {
    Ok(BookGenre {
        genre_id: row.try_get("genre_id")?,
        name: row.try_get("name")?,
        is_primary: row.try_get("is_primary")?,
    })
}

fn duplicate_option(option_type: OptionType, name: &str) -> DbError {
    DbError::validation(format!("{} '{}' already exists", option_type, name))
}

async fn genres_of_book<'e, E>(executor: E, book_id: Id) -> DbResult<Vec<BookGenre>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "SELECT bg.genre_id, o.name, bg.is_primary FROM book_genres bg \
         JOIN lookup_options o ON o.id = bg.genre_id \
         WHERE bg.book_id = ? ORDER BY bg.is_primary DESC, o.name ASC",
    )
    .bind(book_id)
    .fetch_all(executor)
    .await?
    .iter()
    .map(genre_from_row)
    .collect()
}

/// Checks a genre assignment for problems that need no database access.
pub(crate) fn validate_assignment(genres: &[GenreAssignment]) -> DbResult<()> {
    let mut seen = HashSet::new();
    for genre in genres {
        if !seen.insert(genre.genre_id) {
            return Err(DbError::validation(format!(
                "Genre {} is listed more than once",
                genre.genre_id
            )));
        }
    }

    if genres.iter().filter(|g| g.is_primary).count() > 1 {
        return Err(DbError::validation("Only one genre can be marked as primary"));
    }

    Ok(())
}

/// Replace every genre of `book_id` on `conn`. All checks run before the first write.
async fn replace_book_genres(
    conn: &mut SqliteConnection,
    book_id: Id,
    genres: &[GenreAssignment],
) -> DbResult<Vec<BookGenre>> {
    ensure_exists(&mut *conn, "books", "Book", book_id).await?;

    for genre in genres {
        let row: Option<(String, bool)> =
            sqlx::query_as("SELECT option_type, is_active FROM lookup_options WHERE id = ?")
                .bind(genre.genre_id)
                .fetch_optional(&mut *conn)
                .await?;

        match row {
            None => return Err(DbError::not_found("Genre", genre.genre_id)),
            Some((option_type, _)) if option_type != OptionType::Genre.as_str() => {
                return Err(DbError::validation(format!(
                    "Option {} is a {}, not a genre",
                    genre.genre_id, option_type
                )));
            }
            Some((_, false)) => {
                return Err(DbError::validation(format!(
                    "Genre {} is inactive",
                    genre.genre_id
                )));
            }
            Some(_) => {}
        }
    }

    sqlx::query("DELETE FROM book_genres WHERE book_id = ?")
        .bind(book_id)
        .execute(&mut *conn)
        .await?;

    for genre in genres {
        sqlx::query("INSERT INTO book_genres (book_id, genre_id, is_primary) VALUES (?, ?, ?)")
            .bind(book_id)
            .bind(genre.genre_id)
            .bind(genre.is_primary)
            .execute(&mut *conn)
            .await?;
    }

    genres_of_book(&mut *conn, book_id).await
}

impl<'a> MetadataRepository for SqliteMetadataRepository<'a> {
    async fn list_options(
        &self,
        option_type: OptionType,
        include_inactive: bool,
    ) -> DbResult<Vec<LookupOption>> {
        let sql = if include_inactive {
            format!("{} WHERE option_type = ? ORDER BY name ASC", SELECT_OPTION)
        } else {
            format!(
                "{} WHERE option_type = ? AND is_active = 1 ORDER BY name ASC",
                SELECT_OPTION
            )
        };

        sqlx::query(&sql)
            .bind(option_type.as_str())
            .fetch_all(self.pool)
            .await?
            .iter()
            .map(option_from_row)
            .collect()
    }

    async fn get_option(&self, id: Id) -> DbResult<LookupOption> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_OPTION))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Lookup option", id))?;

        option_from_row(&row)
    }

    async fn create_option(&self, option: &NewLookupOption) -> DbResult<LookupOption> {
        if option.name.trim().is_empty() {
            return Err(DbError::validation("Option name cannot be empty"));
        }

        let id = sqlx::query(
            "INSERT INTO lookup_options (option_type, name, description) VALUES (?, ?, ?)",
        )
        .bind(option.option_type.as_str())
        .bind(&option.name)
        .bind(&option.description)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => duplicate_option(option.option_type, &option.name),
            other => other,
        })?
        .last_insert_rowid();

        self.get_option(id).await
    }

    async fn update_option(&self, id: Id, update: &LookupOptionUpdate) -> DbResult<LookupOption> {
        let builder = UpdateBuilder::new("lookup_options", "Lookup option")
            .set("name", update.name.clone())
            .set("description", update.description.clone())
            .set("is_active", update.is_active);

        if builder.is_empty() {
            return Err(DbError::NoFieldsToUpdate {
                entity_type: "Lookup option".to_string(),
            });
        }

        let current = self.get_option(id).await?;
        builder
            .execute(id, self.pool)
            .await
            .map_err(|e| match (e, &update.name) {
                (DbError::UniqueViolation { .. }, Some(name)) => {
                    duplicate_option(current.option_type, name)
                }
                (e, _) => e,
            })?;

        self.get_option(id).await
    }

    async fn delete_option(&self, id: Id, soft_delete: bool) -> DbResult<OptionRemoval> {
        self.get_option(id).await?;

        if soft_delete {
            sqlx::query("UPDATE lookup_options SET is_active = 0, updated_at = ? WHERE id = ?")
                .bind(current_timestamp())
                .bind(id)
                .execute(self.pool)
                .await?;
            return Ok(OptionRemoval::Deactivated);
        }

        // Book genres reference options with RESTRICT; the foreign-key error
        // leaves the row untouched.
        sqlx::query("DELETE FROM lookup_options WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(OptionRemoval::Deleted)
    }

    async fn assign_book_genres(
        &self,
        book_id: Id,
        genres: &[GenreAssignment],
    ) -> DbResult<Vec<BookGenre>> {
        validate_assignment(genres)?;

        let genres = genres.to_vec();
        in_transaction(self.pool, move |conn| {
            async move { replace_book_genres(conn, book_id, &genres).await }.boxed()
        })
        .await
    }

    async fn book_genres(&self, book_id: Id) -> DbResult<Vec<BookGenre>> {
        ensure_exists(self.pool, "books", "Book", book_id).await?;
        genres_of_book(self.pool, book_id).await
    }

    async fn set_series_metadata(
        &self,
        series_id: Id,
        key: &str,
        value: Option<&str>,
    ) -> DbResult<SeriesMetadata> {
        if key.trim().is_empty() {
            return Err(DbError::validation("Metadata key cannot be empty"));
        }

        let row = sqlx::query(
            "INSERT INTO series_metadata (series_id, metadata_key, metadata_value, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (series_id, metadata_key) \
             DO UPDATE SET metadata_value = excluded.metadata_value, updated_at = excluded.updated_at \
             RETURNING metadata_key, metadata_value, updated_at",
        )
        .bind(series_id)
        .bind(key)
        .bind(value)
        .bind(current_timestamp())
        .fetch_one(self.pool)
        .await?;

        metadata_from_row(&row)
    }

    async fn series_metadata(&self, series_id: Id, key: Option<&str>) -> DbResult<Vec<SeriesMetadata>> {
        ensure_exists(self.pool, "series", "Series", series_id).await?;

        let rows = match key {
            Some(key) => {
                sqlx::query(
                    "SELECT metadata_key, metadata_value, updated_at FROM series_metadata \
                     WHERE series_id = ? AND metadata_key = ?",
                )
                .bind(series_id)
                .bind(key)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT metadata_key, metadata_value, updated_at FROM series_metadata \
                     WHERE series_id = ? ORDER BY metadata_key ASC",
                )
                .bind(series_id)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.iter().map(metadata_from_row).collect()
    }
}
