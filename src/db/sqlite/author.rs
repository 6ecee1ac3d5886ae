//! SQLite AuthorRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{UpdateBuilder, build_limit_offset_clause};
use crate::db::{
    Author, AuthorRepository, AuthorUpdate, DbError, DbResult, Id, ListResult, NewAuthor,
    PageSort,
};

const SELECT_AUTHOR: &str = "SELECT id, name, email, bio, created_at, updated_at FROM authors";

/// SQLx-backed author repository.
pub struct SqliteAuthorRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn author_from_row(row: &SqliteRow) -> DbResult<Author> {
    Ok(Author {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        bio: row.try_get("bio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl<'a> AuthorRepository for SqliteAuthorRepository<'a> {
    async fn create(&self, author: &NewAuthor) -> DbResult<Author> {
        if author.name.trim().is_empty() {
            return Err(DbError::validation("Author name cannot be empty"));
        }

        let id = sqlx::query("INSERT INTO authors (name, email, bio) VALUES (?, ?, ?)")
            .bind(&author.name)
            .bind(&author.email)
            .bind(&author.bio)
            .execute(self.pool)
            .await?
            .last_insert_rowid();

        self.get(id).await
    }

    async fn get(&self, id: Id) -> DbResult<Author> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_AUTHOR))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Author", id))?;

        author_from_row(&row)
    }

    async fn list(&self, page: &PageSort) -> DbResult<ListResult<Author>> {
        let sql = format!(
            "{} ORDER BY name ASC{}",
            SELECT_AUTHOR,
            build_limit_offset_clause(page)
        );

        let items = sqlx::query(&sql)
            .fetch_all(self.pool)
            .await?
            .iter()
            .map(author_from_row)
            .collect::<DbResult<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(self.pool)
            .await?;

        Ok(ListResult {
            items,
            total: total as usize,
            limit: page.limit,
            offset: page.offset.unwrap_or(0),
        })
    }

    async fn update(&self, id: Id, update: &AuthorUpdate) -> DbResult<Author> {
        UpdateBuilder::new("authors", "Author")
            .set("name", update.name.clone())
            .set("email", update.email.clone())
            .set("bio", update.bio.clone())
            .execute(id, self.pool)
            .await?;

        self.get(id).await
    }

    async fn delete(&self, id: Id) -> DbResult<Author> {
        let author = self.get(id).await?;

        sqlx::query("DELETE FROM authors WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(author)
    }
}
