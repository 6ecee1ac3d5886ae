//! Tests for SQLite database connection, transactions and migrations.

use futures_util::FutureExt;

use crate::db::{AuthorRepository, Database, DbError, NewAuthor, PageSort, SqliteDatabase};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_creates_all_tables() {
    let db = setup_db().await;

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .expect("Query should succeed");

    let expected = [
        "_sqlx_migrations",
        "authors",
        "book_genres",
        "books",
        "chapter_location_presence",
        "chapter_scenes",
        "chapters",
        "event_chapter_mappings",
        "locations",
        "lookup_options",
        "series",
        "series_metadata",
        "timeline_events",
        "trope_instances",
        "trope_scene_types",
        "trope_scenes",
        "tropes",
    ];

    for table in &expected {
        assert!(
            tables.iter().any(|t| t == table),
            "Missing table: {}. Found tables: {:?}",
            table,
            tables
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_is_idempotent() {
    let db = setup_db().await;
    db.migrate().await.expect("Second migration should succeed");
}

#[tokio::test(flavor = "multi_thread")]
async fn foreign_keys_are_enforced() {
    let db = setup_db().await;

    let result = sqlx::query("INSERT INTO series (author_id, title) VALUES (999, 'Orphan')")
        .execute(db.pool())
        .await
        .map_err(DbError::from);

    assert!(matches!(result, Err(DbError::ForeignKey { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn restrict_delete_classifies_as_foreign_key() {
    let db = setup_db().await;
    sqlx::query("INSERT INTO authors (name) VALUES ('Owner')")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO series (author_id, title) VALUES (1, 'Owned')")
        .execute(db.pool())
        .await
        .unwrap();

    let result = sqlx::query("DELETE FROM authors WHERE id = 1")
        .execute(db.pool())
        .await
        .map_err(DbError::from);

    assert!(matches!(result, Err(DbError::ForeignKey { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn trigger_abort_is_not_a_foreign_key_error() {
    let db = setup_db().await;
    sqlx::query(
        "CREATE TRIGGER no_authors BEFORE INSERT ON authors \
         BEGIN SELECT RAISE(ABORT, 'closed'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = sqlx::query("INSERT INTO authors (name) VALUES ('Late')")
        .execute(db.pool())
        .await
        .map_err(DbError::from);

    assert!(matches!(result, Err(DbError::Database { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn transaction_rolls_back_on_driver_error() {
    let db = setup_db().await;

    let result: Result<(), DbError> = db
        .transaction(|conn| {
            async move {
                sqlx::query("INSERT INTO authors (name) VALUES ('Doomed')")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("INSERT INTO series (author_id, title) VALUES (999, 'Orphan')")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(DbError::ForeignKey { .. })));
    let authors = db.authors().list(&PageSort::default()).await.unwrap();
    assert_eq!(authors.total, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn transaction_commits_every_statement_on_ok() {
    let db = setup_db().await;

    let inserted = db
        .transaction(|conn| {
            async move {
                sqlx::query("INSERT INTO authors (name) VALUES ('First')")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("INSERT INTO authors (name) VALUES ('Second')")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, DbError>(2)
            }
            .boxed()
        })
        .await
        .expect("Transaction should commit");

    assert_eq!(inserted, 2);
    let authors = db.authors().list(&PageSort::default()).await.unwrap();
    assert_eq!(authors.total, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn transaction_rolls_back_on_error() {
    let db = setup_db().await;

    let result: Result<(), DbError> = db
        .transaction(|conn| {
            async move {
                sqlx::query("INSERT INTO authors (name) VALUES ('Doomed')")
                    .execute(&mut *conn)
                    .await?;
                Err::<(), _>(DbError::validation("abort"))
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(DbError::Validation { .. })));
    let authors = db.authors().list(&PageSort::default()).await.unwrap();
    assert_eq!(authors.total, 0, "No effects of a failed transaction may remain");
}

#[tokio::test(flavor = "multi_thread")]
async fn pool_is_usable_after_failed_statement() {
    let db = setup_db().await;

    let failed = sqlx::query("SELECT * FROM no_such_table")
        .fetch_all(db.pool())
        .await;
    assert!(failed.is_err());

    let author = db
        .authors()
        .create(&NewAuthor {
            name: "After Failure".to_string(),
            ..Default::default()
        })
        .await
        .expect("Connection should be released after an error");
    assert_eq!(author.name, "After Failure");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_reports_timestamp() {
    let db = setup_db().await;

    let status = db.health_check().await;
    assert!(status.healthy);
    assert!(status.timestamp.is_some());
    assert!(status.error.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_reports_closed_pool() {
    let db = setup_db().await;
    db.pool().close().await;

    let status = db.health_check().await;
    assert!(!status.healthy);
    assert!(status.timestamp.is_none());
    assert!(status.error.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn open_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.db");

    let db = SqliteDatabase::open(&path).await.unwrap();
    db.migrate().await.unwrap();
    db.authors()
        .create(&NewAuthor {
            name: "On Disk".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    db.pool().close().await;

    assert!(path.exists());

    let reopened = SqliteDatabase::open(&path).await.unwrap();
    reopened.migrate().await.unwrap();
    let authors = reopened.authors().list(&PageSort::default()).await.unwrap();
    assert_eq!(authors.items[0].name, "On Disk");
}
