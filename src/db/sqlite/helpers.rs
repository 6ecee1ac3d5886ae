//! Shared helper functions for SQLite repositories.

use std::str::FromStr;

use futures_util::future::BoxFuture;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::db::utils::current_timestamp;
use crate::db::{DbError, DbResult, Id, PageSort};

/// A bind value whose type is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Partial-update statement builder.
///
/// Only columns whose value is present are written; absent means "leave
/// unchanged". Column names are `&'static str` so only literals written in
/// the repositories can ever reach the SQL text.
#[derive(Debug)]
pub struct UpdateBuilder {
    table: &'static str,
    entity: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
    touch_updated_at: bool,
}

impl UpdateBuilder {
    pub fn new(table: &'static str, entity: &'static str) -> Self {
        Self {
            table,
            entity,
            assignments: Vec::new(),
            touch_updated_at: true,
        }
    }

    /// For tables without an `updated_at` column.
    pub fn without_timestamp(mut self) -> Self {
        self.touch_updated_at = false;
        self
    }

    /// Set `column` if `value` is present. `Some(None)` writes NULL.
    pub fn set<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.assignments.push((column, v.into()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Columns that will be written, in order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|(c, _)| *c).collect()
    }

    /// Render the statement. The last placeholder is the row id.
    pub fn to_sql(&self) -> DbResult<String> {
        if self.is_empty() {
            return Err(DbError::NoFieldsToUpdate {
                entity_type: self.entity.to_string(),
            });
        }

        let mut sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect();
        if self.touch_updated_at {
            sets.push("updated_at = ?".to_string());
        }

        Ok(format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table,
            sets.join(", ")
        ))
    }

    /// Execute against `executor`. Fails with `NoFieldsToUpdate` before any
    /// SQL is issued when nothing is set, and with `NotFound` when no row matched.
    pub async fn execute<'e, E>(self, id: Id, executor: E) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = self.to_sql()?;

        let mut query = sqlx::query(&sql);
        for (_, value) in &self.assignments {
            query = match value {
                SqlValue::Null => query.bind(None::<i64>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.clone()),
                SqlValue::Bool(v) => query.bind(*v),
            };
        }
        if self.touch_updated_at {
            query = query.bind(current_timestamp());
        }

        let result = query.bind(id).execute(executor).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.entity, id));
        }

        Ok(())
    }
}

/// Run `body` inside one transaction on one leased connection.
///
/// Commits when `body` returns `Ok`, rolls back and returns the error otherwise.
/// `body` owns whatever it needs; the future may only borrow the connection.
pub async fn in_transaction<T, F>(pool: &SqlitePool, body: F) -> DbResult<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, DbResult<T>> + Send,
{
    let mut tx = pool.begin().await?;

    match body(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Fail with `NotFound` unless `table` has a row with `id`.
///
/// `table` is always a literal from the repositories.
pub async fn ensure_exists<'e, E>(
    executor: E,
    table: &'static str,
    entity: &'static str,
    id: Id,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)",
        table
    ))
    .bind(id)
    .fetch_one(executor)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(DbError::not_found(entity, id))
    }
}

/// Parse an enum stored as TEXT.
pub fn parse_column<T: FromStr<Err = String>>(value: &str) -> DbResult<T> {
    value
        .parse()
        .map_err(|message| DbError::Database { message })
}

/// Build LIMIT/OFFSET clause from PageSort parameters.
/// Note: SQL requires LIMIT when using OFFSET. If offset is provided without limit,
/// we use LIMIT -1 (SQLite's "no limit" value).
pub fn build_limit_offset_clause(page: &PageSort) -> String {
    let mut clause = String::new();

    let offset = page.offset.filter(|o| *o > 0);

    if let Some(limit) = page.limit {
        clause.push_str(&format!(" LIMIT {}", limit));
    } else if offset.is_some() {
        clause.push_str(" LIMIT -1");
    }

    if let Some(offset) = offset {
        clause.push_str(&format!(" OFFSET {}", offset));
    }

    clause
}
