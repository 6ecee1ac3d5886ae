//! SQLite SeriesRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{UpdateBuilder, build_limit_offset_clause, parse_column};
use crate::db::{
    DbError, DbResult, Id, ListResult, NewSeries, Series, SeriesQuery, SeriesRepository,
    SeriesUpdate,
};

const SELECT_SERIES: &str = "SELECT s.id, s.author_id, a.name AS author_name, s.title, s.description, \
     s.start_year, s.status, s.created_at, s.updated_at, \
     (SELECT COUNT(*) FROM books b WHERE b.series_id = s.id) AS book_count \
     FROM series s LEFT JOIN authors a ON a.id = s.author_id";

/// SQLx-backed series repository.
pub struct SqliteSeriesRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn series_from_row(row: &SqliteRow) -> DbResult<Series> {
    let status: String = row.try_get("status")?;
    Ok(Series {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        start_year: row.try_get("start_year")?,
        status: parse_column(&status)?,
        book_count: row.try_get("book_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl<'a> SeriesRepository for SqliteSeriesRepository<'a> {
    async fn create(&self, series: &NewSeries) -> DbResult<Series> {
        if series.title.trim().is_empty() {
            return Err(DbError::validation("Series title cannot be empty"));
        }

        let id = sqlx::query(
            "INSERT INTO series (author_id, title, description, start_year, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(series.author_id)
        .bind(&series.title)
        .bind(&series.description)
        .bind(series.start_year)
        .bind(series.status.as_str())
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        self.get(id).await
    }

    async fn get(&self, id: Id) -> DbResult<Series> {
        let row = sqlx::query(&format!("{} WHERE s.id = ?", SELECT_SERIES))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Series", id))?;

        series_from_row(&row)
    }

    async fn list(&self, query: &SeriesQuery) -> DbResult<ListResult<Series>> {
        let where_clause = if query.author_id.is_some() {
            " WHERE s.author_id = ?"
        } else {
            ""
        };

        let sql = format!(
            "{}{} ORDER BY s.title ASC{}",
            SELECT_SERIES,
            where_clause,
            build_limit_offset_clause(&query.page)
        );
        let count_sql = format!("SELECT COUNT(*) FROM series s{}", where_clause);

        let mut select = sqlx::query(&sql);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(author_id) = query.author_id {
            select = select.bind(author_id);
            count = count.bind(author_id);
        }

        let items = select
            .fetch_all(self.pool)
            .await?
            .iter()
            .map(series_from_row)
            .collect::<DbResult<Vec<_>>>()?;
        let total = count.fetch_one(self.pool).await?;

        Ok(ListResult {
            items,
            total: total as usize,
            limit: query.page.limit,
            offset: query.page.offset.unwrap_or(0),
        })
    }

    async fn update(&self, id: Id, update: &SeriesUpdate) -> DbResult<Series> {
        UpdateBuilder::new("series", "Series")
            .set("author_id", update.author_id)
            .set("title", update.title.clone())
            .set("description", update.description.clone())
            .set("start_year", update.start_year)
            .set("status", update.status.map(|s| s.as_str()))
            .execute(id, self.pool)
            .await?;

        self.get(id).await
    }

    async fn delete(&self, id: Id) -> DbResult<Series> {
        let series = self.get(id).await?;

        sqlx::query("DELETE FROM series WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(series)
    }
}
