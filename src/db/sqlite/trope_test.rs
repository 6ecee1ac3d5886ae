//! Tests for SqliteTropeRepository.

use std::collections::HashSet;

use super::trope::recompute_status;
use crate::db::{
    AuthorRepository, BookRepository, ChapterRepository, CompletionStatus, Database, DbError,
    NewAuthor, NewBook, NewChapter, NewScene, NewSeries, NewTrope, NewTropeInstance,
    NewTropeScene, NewTropeSceneType, ScenePlacement, SeriesRepository, SqliteDatabase,
    TropeCategory, TropeRepository,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

/// Returns (series_id, book_id, chapter_id).
async fn seed(db: &SqliteDatabase) -> (i64, i64, i64) {
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
            title: "Hearts".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let book = db
        .books()
        .create(&NewBook {
            series_id: series.id,
            title: "First Kiss".to_string(),
            book_number: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    let chapter = db
        .chapters()
        .create(&NewChapter {
            book_id: book.id,
            chapter_number: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    (series.id, book.id, chapter.id)
}

fn scene_type(function: &str, required: bool) -> NewTropeSceneType {
    NewTropeSceneType {
        scene_function: function.to_string(),
        scene_description: None,
        typical_placement: Some(ScenePlacement::Early),
        required,
    }
}

fn enemies_to_lovers(series_id: i64) -> NewTrope {
    NewTrope {
        series_id,
        name: "Enemies to Lovers".to_string(),
        category: TropeCategory::Romance,
        description: None,
        scene_types: vec![
            scene_type("first clash", true),
            scene_type("forced alliance", false),
            scene_type("confession", true),
        ],
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_trope_with_ordered_scene_types() {
    let db = setup_db().await;
    let (series_id, _, _) = seed(&db).await;

    let detail = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    assert_eq!(detail.trope.category, TropeCategory::Romance);
    let orders: Vec<i64> = detail.scene_types.iter().map(|st| st.sequence_order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(detail.scene_types[2].scene_function, "confession");
    assert!(detail.scene_types[2].required);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_trope_creation_leaves_nothing_behind() {
    let db = setup_db().await;
    let (series_id, _, _) = seed(&db).await;
    db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();

    let result = db.tropes().create(&enemies_to_lovers(series_id)).await;
    assert!(matches!(result, Err(DbError::Validation { .. })));

    let scene_types: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trope_scene_types")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(scene_types, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn scene_type_insert_failure_rolls_back_the_trope() {
    let db = setup_db().await;
    let (series_id, _, _) = seed(&db).await;
    sqlx::query(
        "CREATE TRIGGER reject_confession BEFORE INSERT ON trope_scene_types \
         WHEN NEW.scene_function = 'confession' BEGIN SELECT RAISE(ABORT, 'no confessions'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = db.tropes().create(&enemies_to_lovers(series_id)).await;
    assert!(result.is_err());

    let (tropes, scene_types): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM tropes), (SELECT COUNT(*) FROM trope_scene_types)",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!((tropes, scene_types), (0, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn list_tropes_filters_by_category() {
    let db = setup_db().await;
    let (series_id, _, _) = seed(&db).await;
    db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    db.tropes()
        .create(&NewTrope {
            series_id,
            name: "Chosen One".to_string(),
            category: TropeCategory::Character,
            ..Default::default()
        })
        .await
        .unwrap();

    let all = db.tropes().list(series_id, None).await.unwrap();
    assert_eq!(all.len(), 2);
    let romance = db
        .tropes()
        .list(series_id, Some(TropeCategory::Romance))
        .await
        .unwrap();
    assert_eq!(romance.len(), 1);
    assert_eq!(romance[0].scene_types.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_instance_is_rejected() {
    let db = setup_db().await;
    let (series_id, book_id, _) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = NewTropeInstance {
        trope_id: trope.trope.id,
        book_id,
        ..Default::default()
    };

    let created = db.tropes().create_instance(&instance).await.unwrap();
    assert_eq!(created.completion_status, CompletionStatus::Planned);

    let result = db.tropes().create_instance(&instance).await;
    assert!(matches!(result, Err(DbError::Validation { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn tracking_required_scenes_completes_instance() {
    let db = setup_db().await;
    let (series_id, book_id, chapter_id) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();

    let first = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: trope.scene_types[0].id,
            chapter_id: Some(chapter_id),
            effectiveness_rating: Some(7),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.completion_status, CompletionStatus::InProgress);
    assert_eq!((first.required_covered, first.required_total), (1, 2));

    let second = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: trope.scene_types[2].id,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.completion_status, CompletionStatus::Complete);
    assert_eq!((second.required_covered, second.required_total), (2, 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn tracking_same_scene_type_twice_updates_in_place() {
    let db = setup_db().await;
    let (series_id, book_id, _) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();

    let mut scene = NewTropeScene {
        instance_id: instance.id,
        scene_type_id: trope.scene_types[1].id,
        effectiveness_rating: Some(3),
        ..Default::default()
    };
    let first = db.tropes().track_scene(&scene).await.unwrap();
    scene.effectiveness_rating = Some(9);
    let second = db.tropes().track_scene(&scene).await.unwrap();

    assert_eq!(first.scene.id, second.scene.id);
    assert_eq!(second.scene.effectiveness_rating, Some(9));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_status_update_discards_tracked_scene() {
    let db = setup_db().await;
    let (series_id, book_id, _) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER freeze_instances BEFORE UPDATE ON trope_instances \
         BEGIN SELECT RAISE(ABORT, 'instances are frozen'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: trope.scene_types[0].id,
            ..Default::default()
        })
        .await;
    assert!(result.is_err());

    let tracked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trope_scenes")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(tracked, 0);
    let status: String =
        sqlx::query_scalar("SELECT completion_status FROM trope_instances WHERE id = ?")
            .bind(instance.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(status, CompletionStatus::Planned.as_str());
}

#[tokio::test(flavor = "multi_thread")]
async fn scene_type_of_another_trope_is_rejected() {
    let db = setup_db().await;
    let (series_id, book_id, _) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let other = db
        .tropes()
        .create(&NewTrope {
            series_id,
            name: "Mentor Dies".to_string(),
            scene_types: vec![scene_type("death", true)],
            ..Default::default()
        })
        .await
        .unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();

    let result = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: other.scene_types[0].id,
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DbError::Validation { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn scene_outside_chapter_is_rejected() {
    let db = setup_db().await;
    let (series_id, book_id, chapter_id) = seed(&db).await;
    let second_chapter = db
        .chapters()
        .create(&NewChapter {
            book_id,
            chapter_number: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    let scene = db
        .chapters()
        .create_scene(&NewScene {
            chapter_id: second_chapter.id,
            scene_number: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();

    let result = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: trope.scene_types[0].id,
            chapter_id: Some(chapter_id),
            scene_id: Some(scene.id),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DbError::Validation { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_rating_is_rejected() {
    let db = setup_db().await;

    let result = db
        .tropes()
        .track_scene(&NewTropeScene {
            instance_id: 1,
            scene_type_id: 1,
            effectiveness_rating: Some(11),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DbError::Validation { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn usage_groups_instances_and_scenes() {
    let db = setup_db().await;
    let (series_id, book_id, _) = seed(&db).await;
    let trope = db.tropes().create(&enemies_to_lovers(series_id)).await.unwrap();
    let instance = db
        .tropes()
        .create_instance(&NewTropeInstance {
            trope_id: trope.trope.id,
            book_id,
            ..Default::default()
        })
        .await
        .unwrap();
    db.tropes()
        .track_scene(&NewTropeScene {
            instance_id: instance.id,
            scene_type_id: trope.scene_types[0].id,
            ..Default::default()
        })
        .await
        .unwrap();

    let usage = db.tropes().usage(series_id).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].scene_types.len(), 3);
    assert_eq!(usage[0].instances.len(), 1);
    assert_eq!(usage[0].instances[0].1.len(), 1);
}

#[test]
fn recompute_status_rules() {
    let types = [(1, true), (2, false), (3, true)];
    let covered: HashSet<i64> = [1, 3].into_iter().collect();
    assert_eq!(
        recompute_status(CompletionStatus::InProgress, &types, &covered),
        (CompletionStatus::Complete, 2, 2)
    );

    let partial: HashSet<i64> = [2].into_iter().collect();
    assert_eq!(
        recompute_status(CompletionStatus::Planned, &types, &partial),
        (CompletionStatus::InProgress, 0, 2)
    );

    // Subverted is sticky.
    assert_eq!(
        recompute_status(CompletionStatus::Subverted, &types, &covered).0,
        CompletionStatus::Subverted
    );

    // No required types: every type counts.
    let optional = [(1, false), (2, false)];
    let one: HashSet<i64> = [1].into_iter().collect();
    assert_eq!(
        recompute_status(CompletionStatus::Planned, &optional, &one),
        (CompletionStatus::InProgress, 1, 2)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn usage_for_missing_series_is_not_found() {
    let db = setup_db().await;

    let result = db.tropes().usage(404).await;

    assert!(matches!(
        result,
        Err(DbError::NotFound { entity_type, .. }) if entity_type == "Series"
    ));
}
