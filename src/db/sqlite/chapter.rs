//! SQLite ChapterRepository implementation.

use std::collections::{HashMap, HashSet};

use sqlx::sqlite::SqliteRow;
use futures_util::FutureExt;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use super::helpers::{UpdateBuilder, ensure_exists, in_transaction, parse_column};
use crate::db::utils::current_timestamp;
use crate::db::{
    Chapter, ChapterDeletion, ChapterOrder, ChapterRepository, ChapterUpdate, DbError, DbResult,
    Id, NewChapter, NewScene, Scene,
};

const SELECT_CHAPTER: &str = "SELECT id, book_id, chapter_number, title, summary, word_count, \
     status, pov_character, notes, created_at, updated_at FROM chapters";

const SELECT_SCENE: &str = "SELECT id, chapter_id, scene_number, title, summary, word_count, \
     pov_character FROM chapter_scenes";

/// SQLx-backed chapter and scene repository.
pub struct SqliteChapterRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn chapter_from_row(row: &SqliteRow) -> DbResult<Chapter> {
    let status: String = row.try_get("status")?;
    Ok(Chapter {
        id: row.try_get("id")?,
        book_id: row.try_get("book_id")?,
        chapter_number: row.try_get("chapter_number")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        word_count: row.try_get("word_count")?,
        status: parse_column(&status)?,
        pov_character: row.try_get("pov_character")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn scene_from_row(row: &SqliteRow) -> DbResult<Scene> {
    Ok(Scene {
        id: row.try_get("id")?,
        chapter_id: row.try_get("chapter_id")?,
        scene_number: row.try_get("scene_number")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        word_count: row.try_get("word_count")?,
        pov_character: row.try_get("pov_character")?,
    })
}

fn duplicate_chapter(chapter_number: i64) -> DbError {
    DbError::validation(format!(
        "Chapter {} already exists in this book",
        chapter_number
    ))
}

async fn chapters_of_book<'e, E>(executor: E, book_id: Id) -> DbResult<Vec<Chapter>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(&format!(
        "{} WHERE book_id = ? ORDER BY chapter_number ASC",
        SELECT_CHAPTER
    ))
    .bind(book_id)
    .fetch_all(executor)
    .await?
    .iter()
    .map(chapter_from_row)
    .collect()
}

/// Checks a reorder request for problems that need no database access.
pub(crate) fn validate_order(order: &[ChapterOrder]) -> DbResult<()> {
    if order.is_empty() {
        return Err(DbError::validation("At least one chapter must be provided"));
    }

    let mut ids = HashSet::new();
    let mut targets = HashSet::new();
    for entry in order {
        if entry.new_chapter_number < 1 {
            return Err(DbError::validation(format!(
                "Chapter numbers must be positive, got {}",
                entry.new_chapter_number
            )));
        }
        if !ids.insert(entry.chapter_id) {
            return Err(DbError::validation(format!(
                "Chapter {} is listed more than once",
                entry.chapter_id
            )));
        }
        if !targets.insert(entry.new_chapter_number) {
            return Err(DbError::validation(format!(
                "Duplicate chapter number {} in reorder request",
                entry.new_chapter_number
            )));
        }
    }

    Ok(())
}

impl<'a> SqliteChapterRepository<'a> {
    async fn number_taken(
        &self,
        book_id: Id,
        chapter_number: i64,
        except_id: Option<Id>,
    ) -> DbResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chapters WHERE book_id = ? AND chapter_number = ? AND id != ?)",
        )
        .bind(book_id)
        .bind(chapter_number)
        .bind(except_id.unwrap_or(-1))
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    async fn get_scene(&self, id: Id) -> DbResult<Scene> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SCENE))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Scene", id))?;

        scene_from_row(&row)
    }
}

/// Renumber chapters of `book_id` on `conn`. All checks run before the first write.
async fn apply_reorder(
    conn: &mut SqliteConnection,
    book_id: Id,
    order: &[ChapterOrder],
) -> DbResult<Vec<Chapter>> {
    ensure_exists(&mut *conn, "books", "Book", book_id).await?;

    let current: HashMap<Id, i64> =
        sqlx::query_as::<_, (Id, i64)>("SELECT id, chapter_number FROM chapters WHERE book_id = ?")
            .bind(book_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    for entry in order {
        if !current.contains_key(&entry.chapter_id) {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chapters WHERE id = ?)")
                    .bind(entry.chapter_id)
                    .fetch_one(&mut *conn)
                    .await?;
            if !exists {
                return Err(DbError::not_found("Chapter", entry.chapter_id));
            }
            return Err(DbError::validation(format!(
                "Chapter {} does not belong to book {}",
                entry.chapter_id, book_id
            )));
        }
    }

    let moving: HashSet<Id> = order.iter().map(|e| e.chapter_id).collect();
    for (id, number) in &current {
        if moving.contains(id) {
            continue;
        }
        if order.iter().any(|e| e.new_chapter_number == *number) {
            return Err(DbError::validation(format!(
                "Chapter number {} is already used by chapter {}",
                number, id
            )));
        }
    }

    // Park every moving chapter on a negative number first so that
    // UNIQUE(book_id, chapter_number) holds after each statement.
    for entry in order {
        sqlx::query("UPDATE chapters SET chapter_number = ? WHERE id = ?")
            .bind(-entry.new_chapter_number)
            .bind(entry.chapter_id)
            .execute(&mut *conn)
            .await?;
    }

    let now = current_timestamp();
    for entry in order {
        sqlx::query("UPDATE chapters SET chapter_number = ?, updated_at = ? WHERE id = ?")
            .bind(entry.new_chapter_number)
            .bind(&now)
            .bind(entry.chapter_id)
            .execute(&mut *conn)
            .await?;
    }

    chapters_of_book(&mut *conn, book_id).await
}

impl<'a> ChapterRepository for SqliteChapterRepository<'a> {
    async fn create(&self, chapter: &NewChapter) -> DbResult<Chapter> {
        if chapter.chapter_number < 1 {
            return Err(DbError::validation("Chapter number must be positive"));
        }

        if self
            .number_taken(chapter.book_id, chapter.chapter_number, None)
            .await?
        {
            return Err(duplicate_chapter(chapter.chapter_number));
        }

        let id = sqlx::query(
            "INSERT INTO chapters (book_id, chapter_number, title, summary, status, pov_character, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chapter.book_id)
        .bind(chapter.chapter_number)
        .bind(&chapter.title)
        .bind(&chapter.summary)
        .bind(chapter.status.as_str())
        .bind(&chapter.pov_character)
        .bind(&chapter.notes)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => duplicate_chapter(chapter.chapter_number),
            other => other,
        })?
        .last_insert_rowid();

        self.get(id).await
    }

    async fn get(&self, id: Id) -> DbResult<Chapter> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CHAPTER))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Chapter", id))?;

        chapter_from_row(&row)
    }

    async fn list_by_book(&self, book_id: Id) -> DbResult<Vec<Chapter>> {
        chapters_of_book(self.pool, book_id).await
    }

    async fn update(&self, id: Id, update: &ChapterUpdate) -> DbResult<Chapter> {
        let builder = UpdateBuilder::new("chapters", "Chapter")
            .set("chapter_number", update.chapter_number)
            .set("title", update.title.clone())
            .set("summary", update.summary.clone())
            .set("word_count", update.word_count)
            .set("status", update.status.map(|s| s.as_str()))
            .set("pov_character", update.pov_character.clone())
            .set("notes", update.notes.clone());

        if builder.is_empty() {
            return Err(DbError::NoFieldsToUpdate {
                entity_type: "Chapter".to_string(),
            });
        }

        if let Some(number) = update.chapter_number {
            if number < 1 {
                return Err(DbError::validation("Chapter number must be positive"));
            }
            let current = self.get(id).await?;
            if self.number_taken(current.book_id, number, Some(id)).await? {
                return Err(duplicate_chapter(number));
            }
        }

        builder
            .execute(id, self.pool)
            .await
            .map_err(|e| match (e, update.chapter_number) {
                (DbError::UniqueViolation { .. }, Some(number)) => duplicate_chapter(number),
                (e, _) => e,
            })?;

        self.get(id).await
    }

    async fn delete(&self, id: Id) -> DbResult<ChapterDeletion> {
        let chapter = self.get(id).await?;

        let scene_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chapter_scenes WHERE chapter_id = ?")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        let presence_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chapter_location_presence WHERE chapter_id = ?")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        sqlx::query("DELETE FROM chapters WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(ChapterDeletion {
            chapter,
            scene_count,
            presence_count,
        })
    }

    async fn reorder(&self, book_id: Id, order: &[ChapterOrder]) -> DbResult<Vec<Chapter>> {
        validate_order(order)?;

        let order = order.to_vec();
        in_transaction(self.pool, move |conn| {
            async move { apply_reorder(conn, book_id, &order).await }.boxed()
        })
        .await
    }

    async fn create_scene(&self, scene: &NewScene) -> DbResult<Scene> {
        if scene.scene_number < 1 {
            return Err(DbError::validation("Scene number must be positive"));
        }

        let duplicate = || {
            DbError::validation(format!(
                "Scene {} already exists in chapter {}",
                scene.scene_number, scene.chapter_id
            ))
        };

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chapter_scenes WHERE chapter_id = ? AND scene_number = ?)",
        )
        .bind(scene.chapter_id)
        .bind(scene.scene_number)
        .fetch_one(self.pool)
        .await?;
        if taken {
            return Err(duplicate());
        }

        let id = sqlx::query(
            "INSERT INTO chapter_scenes (chapter_id, scene_number, title, summary, word_count, pov_character) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scene.chapter_id)
        .bind(scene.scene_number)
        .bind(&scene.title)
        .bind(&scene.summary)
        .bind(scene.word_count.unwrap_or(0))
        .bind(&scene.pov_character)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => duplicate(),
            other => other,
        })?
        .last_insert_rowid();

        self.get_scene(id).await
    }

    async fn list_scenes(&self, chapter_id: Id) -> DbResult<Vec<Scene>> {
        sqlx::query(&format!(
            "{} WHERE chapter_id = ? ORDER BY scene_number ASC",
            SELECT_SCENE
        ))
        .bind(chapter_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(scene_from_row)
        .collect()
    }
}
