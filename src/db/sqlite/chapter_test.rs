//! Tests for SqliteChapterRepository, including atomic reordering.

use super::chapter::validate_order;
use crate::db::{
    AuthorRepository, BookRepository, ChapterOrder, ChapterRepository, ChapterStatus,
    ChapterUpdate, Database, DbError, NewAuthor, NewBook, NewChapter, NewScene, NewSeries,
    SeriesRepository, SqliteDatabase,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

/// Creates an author, series and book; returns the book id.
async fn seed_book(db: &SqliteDatabase) -> i64 {
    let author = db
        .authors()
        .create(&NewAuthor {
            name: "Author".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let series = db
        .series()
        .create(&NewSeries {
            author_id: author.id,
            title: "Series".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    db.books()
        .create(&NewBook {
            series_id: series.id,
            title: "Book".to_string(),
            book_number: Some(1),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

async fn add_chapters(db: &SqliteDatabase, book_id: i64, count: i64) -> Vec<i64> {
    let mut ids = Vec::new();
    for number in 1..=count {
        let chapter = db
            .chapters()
            .create(&NewChapter {
                book_id,
                chapter_number: number,
                title: Some(format!("Chapter {}", number)),
                ..Default::default()
            })
            .await
            .unwrap();
        ids.push(chapter.id);
    }
    ids
}

async fn numbers_by_id(db: &SqliteDatabase, ids: &[i64]) -> Vec<i64> {
    let mut numbers = Vec::new();
    for id in ids {
        numbers.push(db.chapters().get(*id).await.unwrap().chapter_number);
    }
    numbers
}

fn order(pairs: &[(i64, i64)]) -> Vec<ChapterOrder> {
    pairs
        .iter()
        .map(|(chapter_id, new_chapter_number)| ChapterOrder {
            chapter_id: *chapter_id,
            new_chapter_number: *new_chapter_number,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn create_and_list_chapters_in_order() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;

    for number in [3, 1, 2] {
        db.chapters()
            .create(&NewChapter {
                book_id,
                chapter_number: number,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let chapters = db.chapters().list_by_book(book_id).await.unwrap();
    let numbers: Vec<i64> = chapters.iter().map(|c| c.chapter_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(chapters.iter().all(|c| c.status == ChapterStatus::Planned));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_chapter_number_is_rejected() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    add_chapters(&db, book_id, 1).await;

    let result = db
        .chapters()
        .create(&NewChapter {
            book_id,
            chapter_number: 1,
            ..Default::default()
        })
        .await;

    match result {
        Err(DbError::Validation { message }) => {
            assert_eq!(message, "Chapter 1 already exists in this book")
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chapter_for_missing_book_is_a_foreign_key_error() {
    let db = setup_db().await;

    let result = db
        .chapters()
        .create(&NewChapter {
            book_id: 999,
            chapter_number: 1,
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(DbError::ForeignKey { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn update_chapter_sets_and_clears_fields() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 1).await;

    let updated = db
        .chapters()
        .update(
            ids[0],
            &ChapterUpdate {
                title: Some(None),
                pov_character: Some(Some("Mara".to_string())),
                word_count: Some(3200),
                status: Some(ChapterStatus::Drafted),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, None);
    assert_eq!(updated.pov_character.as_deref(), Some("Mara"));
    assert_eq!(updated.word_count, 3200);
    assert_eq!(updated.status, ChapterStatus::Drafted);
    assert_eq!(updated.chapter_number, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_missing_chapter_is_not_found() {
    let db = setup_db().await;

    let result = db
        .chapters()
        .update(
            31,
            &ChapterUpdate {
                word_count: Some(1),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(DbError::NotFound { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_chapter_reports_scene_and_presence_counts() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 1).await;
    for scene_number in 1..=3 {
        db.chapters()
            .create_scene(&NewScene {
                chapter_id: ids[0],
                scene_number,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let deletion = db.chapters().delete(ids[0]).await.unwrap();
    assert_eq!(deletion.scene_count, 3);
    assert_eq!(deletion.presence_count, 0);
    assert!(db.chapters().list_scenes(ids[0]).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_scene_number_is_rejected() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 1).await;
    let scene = NewScene {
        chapter_id: ids[0],
        scene_number: 1,
        title: Some("Opening".to_string()),
        ..Default::default()
    };

    let created = db.chapters().create_scene(&scene).await.unwrap();
    assert_eq!(created.word_count, 0);

    let result = db.chapters().create_scene(&scene).await;
    assert!(matches!(result, Err(DbError::Validation { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_applies_permutation() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 3).await;

    // Rotate: 1 -> 3, 2 -> 1, 3 -> 2.
    let chapters = db
        .chapters()
        .reorder(book_id, &order(&[(ids[0], 3), (ids[1], 1), (ids[2], 2)]))
        .await
        .unwrap();

    let returned: Vec<(i64, i64)> = chapters.iter().map(|c| (c.chapter_number, c.id)).collect();
    assert_eq!(returned, vec![(1, ids[1]), (2, ids[2]), (3, ids[0])]);
    assert_eq!(numbers_by_id(&db, &ids).await, vec![3, 1, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_swap_of_two_chapters() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 3).await;

    db.chapters()
        .reorder(book_id, &order(&[(ids[0], 2), (ids[1], 1)]))
        .await
        .unwrap();

    assert_eq!(numbers_by_id(&db, &ids).await, vec![2, 1, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_with_duplicate_target_changes_nothing() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 2).await;

    let result = db
        .chapters()
        .reorder(book_id, &order(&[(ids[0], 2), (ids[1], 2)]))
        .await;

    assert!(matches!(result, Err(DbError::Validation { .. })));
    assert_eq!(numbers_by_id(&db, &ids).await, vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_colliding_with_untouched_chapter_rolls_back() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 3).await;

    // Chapter 3 is not part of the request but owns number 3.
    let result = db
        .chapters()
        .reorder(book_id, &order(&[(ids[0], 3), (ids[1], 1)]))
        .await;

    match result {
        Err(DbError::Validation { message }) => assert!(message.contains("already used")),
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(numbers_by_id(&db, &ids).await, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_failing_mid_write_rolls_back_every_update() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 3).await;

    // Fails the final renumbering statement, after the parking updates ran.
    sqlx::query(
        "CREATE TRIGGER fail_final_number BEFORE UPDATE OF chapter_number ON chapters \
         WHEN NEW.chapter_number = 1 BEGIN SELECT RAISE(ABORT, 'renumbering failed'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = db
        .chapters()
        .reorder(book_id, &order(&[(ids[0], 3), (ids[1], 2), (ids[2], 1)]))
        .await;

    assert!(result.is_err());
    assert_eq!(numbers_by_id(&db, &ids).await, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_rejects_chapter_from_other_book() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;
    let ids = add_chapters(&db, book_id, 1).await;

    let series_id = db.books().get(book_id).await.unwrap().series_id;
    let other_book = db
        .books()
        .create(&NewBook {
            series_id,
            title: "Other".to_string(),
            book_number: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    let foreign = add_chapters(&db, other_book.id, 1).await;

    let result = db
        .chapters()
        .reorder(book_id, &order(&[(ids[0], 2), (foreign[0], 1)]))
        .await;

    assert!(matches!(result, Err(DbError::Validation { .. })));
    assert_eq!(numbers_by_id(&db, &ids).await, vec![1]);
    assert_eq!(numbers_by_id(&db, &foreign).await, vec![1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reorder_unknown_chapter_is_not_found() {
    let db = setup_db().await;
    let book_id = seed_book(&db).await;

    let result = db.chapters().reorder(book_id, &order(&[(404, 1)])).await;
    assert!(matches!(result, Err(DbError::NotFound { .. })));
}

#[test]
fn validate_order_rejects_bad_requests() {
    assert!(validate_order(&[]).is_err());
    assert!(validate_order(&order(&[(1, 0)])).is_err());
    assert!(validate_order(&order(&[(1, 1), (1, 2)])).is_err());
    assert!(validate_order(&order(&[(1, 1), (2, 1)])).is_err());
    assert!(validate_order(&order(&[(1, 2), (2, 1)])).is_ok());
}
