//! SQLite BookRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{UpdateBuilder, build_limit_offset_clause, parse_column};
use crate::db::{
    Book, BookDeletion, BookQuery, BookRepository, BookUpdate, DbError, DbResult, Id, ListResult,
    NewBook,
};

const SELECT_BOOK: &str = "SELECT id, series_id, title, book_number, status, target_word_count, \
     actual_word_count, publication_year, description, isbn, created_at, updated_at FROM books";

/// SQLx-backed book repository.
pub struct SqliteBookRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

pub(crate) fn book_from_row(row: &SqliteRow) -> DbResult<Book> {
    let status: String = row.try_get("status")?;
    Ok(Book {
        id: row.try_get("id")?,
        series_id: row.try_get("series_id")?,
        title: row.try_get("title")?,
        book_number: row.try_get("book_number")?,
        status: parse_column(&status)?,
        target_word_count: row.try_get("target_word_count")?,
        actual_word_count: row.try_get("actual_word_count")?,
        publication_year: row.try_get("publication_year")?,
        description: row.try_get("description")?,
        isbn: row.try_get("isbn")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn duplicate_number(book_number: i64) -> DbError {
    DbError::validation(format!(
        "Book #{} already exists in this series",
        book_number
    ))
}

impl<'a> SqliteBookRepository<'a> {
    /// Fast-path duplicate check. The UNIQUE(series_id, book_number)
    /// constraint remains the authoritative rejection.
    async fn number_taken(
        &self,
        series_id: Id,
        book_number: i64,
        except_id: Option<Id>,
    ) -> DbResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE series_id = ? AND book_number = ? AND id != ?)",
        )
        .bind(series_id)
        .bind(book_number)
        .bind(except_id.unwrap_or(-1))
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }
}

impl<'a> BookRepository for SqliteBookRepository<'a> {
    async fn create(&self, book: &NewBook) -> DbResult<Book> {
        if book.title.trim().is_empty() {
            return Err(DbError::validation("Book title cannot be empty"));
        }

        if let Some(number) = book.book_number
            && self.number_taken(book.series_id, number, None).await?
        {
            return Err(duplicate_number(number));
        }

        let result = sqlx::query(
            "INSERT INTO books (series_id, title, book_number, status, target_word_count, \
             publication_year, description, isbn) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(book.series_id)
        .bind(&book.title)
        .bind(book.book_number)
        .bind(book.status.as_str())
        .bind(book.target_word_count)
        .bind(book.publication_year)
        .bind(&book.description)
        .bind(&book.isbn)
        .execute(self.pool)
        .await
        .map_err(DbError::from)
        .map_err(|e| match (e, book.book_number) {
            (DbError::UniqueViolation { .. }, Some(number)) => duplicate_number(number),
            (e, _) => e,
        })?;

        self.get(result.last_insert_rowid()).await
    }

    async fn get(&self, id: Id) -> DbResult<Book> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_BOOK))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Book", id))?;

        book_from_row(&row)
    }

    async fn list(&self, query: &BookQuery) -> DbResult<ListResult<Book>> {
        let mut conditions: Vec<&str> = vec![];
        if query.series_id.is_some() {
            conditions.push("series_id = ?");
        }
        if query.status.is_some() {
            conditions.push("status = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{}{} ORDER BY series_id ASC, book_number ASC, id ASC{}",
            SELECT_BOOK,
            where_clause,
            build_limit_offset_clause(&query.page)
        );
        let count_sql = format!("SELECT COUNT(*) FROM books{}", where_clause);

        let mut select = sqlx::query(&sql);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(series_id) = query.series_id {
            select = select.bind(series_id);
            count = count.bind(series_id);
        }
        if let Some(status) = query.status {
            select = select.bind(status.as_str());
            count = count.bind(status.as_str());
        }

        let items = select
            .fetch_all(self.pool)
            .await?
            .iter()
            .map(book_from_row)
            .collect::<DbResult<Vec<_>>>()?;
        let total = count.fetch_one(self.pool).await?;

        Ok(ListResult {
            items,
            total: total as usize,
            limit: query.page.limit,
            offset: query.page.offset.unwrap_or(0),
        })
    }

    async fn update(&self, id: Id, update: &BookUpdate) -> DbResult<Book> {
        let builder = UpdateBuilder::new("books", "Book")
            .set("title", update.title.clone())
            .set("book_number", update.book_number)
            .set("status", update.status.map(|s| s.as_str()))
            .set("target_word_count", update.target_word_count)
            .set("actual_word_count", update.actual_word_count)
            .set("publication_year", update.publication_year)
            .set("description", update.description.clone())
            .set("isbn", update.isbn.clone());

        if builder.is_empty() {
            return Err(DbError::NoFieldsToUpdate {
                entity_type: "Book".to_string(),
            });
        }

        if let Some(Some(number)) = update.book_number {
            let current = self.get(id).await?;
            if self.number_taken(current.series_id, number, Some(id)).await? {
                return Err(duplicate_number(number));
            }
        }

        builder
            .execute(id, self.pool)
            .await
            .map_err(|e| match (e, update.book_number) {
                (DbError::UniqueViolation { .. }, Some(Some(number))) => duplicate_number(number),
                (e, _) => e,
            })?;

        self.get(id).await
    }

    async fn delete(&self, id: Id) -> DbResult<BookDeletion> {
        let book = self.get(id).await?;

        let chapter_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE book_id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        let scene_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chapter_scenes cs JOIN chapters c ON c.id = cs.chapter_id WHERE c.book_id = ?",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        // Chapters, scenes, genres and trope instances cascade from here.
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(BookDeletion {
            book,
            chapter_count,
            scene_count,
        })
    }
}
