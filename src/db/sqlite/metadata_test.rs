//! Tests for SqliteMetadataRepository.

use super::metadata::validate_assignment;
use crate::db::{
    AuthorRepository, BookRepository, Database, DbError, GenreAssignment, LookupOptionUpdate,
    MetadataRepository, NewAuthor, NewBook, NewLookupOption, NewSeries, OptionRemoval,
    OptionType, SeriesRepository, SqliteDatabase,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

/// Returns (series_id, book_id).
async fn seed_book(db: &SqliteDatabase) -> (i64, i64) {
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
    let book = db
        .books()
        .create(&NewBook {
            series_id: series.id,
            title: "Book".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    (series.id, book.id)
}

async fn create_option(db: &SqliteDatabase, option_type: OptionType, name: &str) -> i64 {
    db.metadata()
        .create_option(&NewLookupOption {
            option_type,
            name: name.to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_delete_keeps_row_inactive() {
    let db = setup_db().await;
    let id = create_option(&db, OptionType::Genre, "Fantasy").await;

    let removal = db.metadata().delete_option(id, true).await.unwrap();
    assert_eq!(removal, OptionRemoval::Deactivated);

    let option = db.metadata().get_option(id).await.unwrap();
    assert!(!option.is_active);

    let active = db
        .metadata()
        .list_options(OptionType::Genre, false)
        .await
        .unwrap();
    assert!(active.is_empty());
    let everything = db
        .metadata()
        .list_options(OptionType::Genre, true)
        .await
        .unwrap();
    assert_eq!(everything.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn hard_delete_removes_unreferenced_row() {
    let db = setup_db().await;
    let id = create_option(&db, OptionType::PlotThreadType, "Mystery").await;

    let removal = db.metadata().delete_option(id, false).await.unwrap();
    assert_eq!(removal, OptionRemoval::Deleted);
    assert!(matches!(
        db.metadata().get_option(id).await,
        Err(DbError::NotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn hard_delete_of_referenced_genre_leaves_row_unchanged() {
    let db = setup_db().await;
    let (_, book_id) = seed_book(&db).await;
    let genre = create_option(&db, OptionType::Genre, "Romance").await;
    db.metadata()
        .assign_book_genres(
            book_id,
            &[GenreAssignment {
                genre_id: genre,
                is_primary: true,
            }],
        )
        .await
        .unwrap();

    let result = db.metadata().delete_option(genre, false).await;
    assert!(matches!(result, Err(DbError::ForeignKey { .. })));

    let option = db.metadata().get_option(genre).await.unwrap();
    assert!(option.is_active);
    assert_eq!(option.name, "Romance");
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_option_name_is_rejected_per_type() {
    let db = setup_db().await;
    create_option(&db, OptionType::Genre, "Noir").await;

    let duplicate = db
        .metadata()
        .create_option(&NewLookupOption {
            option_type: OptionType::Genre,
            name: "Noir".to_string(),
            description: None,
        })
        .await;
    assert!(matches!(duplicate, Err(DbError::Validation { .. })));

    // Same name under another type is fine.
    create_option(&db, OptionType::PlotThreadType, "Noir").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn update_option_can_reactivate() {
    let db = setup_db().await;
    let id = create_option(&db, OptionType::RelationshipType, "Rivals").await;
    db.metadata().delete_option(id, true).await.unwrap();

    let updated = db
        .metadata()
        .update_option(
            id,
            &LookupOptionUpdate {
                is_active: Some(true),
                description: Some(Some("Friendly competition".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_active);
    assert_eq!(updated.description.as_deref(), Some("Friendly competition"));
}

#[tokio::test(flavor = "multi_thread")]
async fn assign_genres_replaces_previous_set() {
    let db = setup_db().await;
    let (_, book_id) = seed_book(&db).await;
    let fantasy = create_option(&db, OptionType::Genre, "Fantasy").await;
    let horror = create_option(&db, OptionType::Genre, "Horror").await;
    let comedy = create_option(&db, OptionType::Genre, "Comedy").await;

    db.metadata()
        .assign_book_genres(
            book_id,
            &[
                GenreAssignment {
                    genre_id: fantasy,
                    is_primary: true,
                },
                GenreAssignment {
                    genre_id: horror,
                    is_primary: false,
                },
            ],
        )
        .await
        .unwrap();

    let assigned = db
        .metadata()
        .assign_book_genres(
            book_id,
            &[GenreAssignment {
                genre_id: comedy,
                is_primary: false,
            }],
        )
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].name, "Comedy");

    let stored = db.metadata().book_genres(book_id).await.unwrap();
    assert_eq!(stored, assigned);
}

#[tokio::test(flavor = "multi_thread")]
async fn assign_genres_rejects_inactive_or_wrong_type_and_keeps_old_set() {
    let db = setup_db().await;
    let (_, book_id) = seed_book(&db).await;
    let fantasy = create_option(&db, OptionType::Genre, "Fantasy").await;
    let retired = create_option(&db, OptionType::Genre, "Retired").await;
    let not_a_genre = create_option(&db, OptionType::RelationshipType, "Allies").await;
    db.metadata().delete_option(retired, true).await.unwrap();

    db.metadata()
        .assign_book_genres(
            book_id,
            &[GenreAssignment {
                genre_id: fantasy,
                is_primary: true,
            }],
        )
        .await
        .unwrap();

    for bad in [retired, not_a_genre] {
        let result = db
            .metadata()
            .assign_book_genres(
                book_id,
                &[GenreAssignment {
                    genre_id: bad,
                    is_primary: false,
                }],
            )
            .await;
        assert!(matches!(result, Err(DbError::Validation { .. })));
    }

    let missing = db
        .metadata()
        .assign_book_genres(
            book_id,
            &[GenreAssignment {
                genre_id: 9999,
                is_primary: false,
            }],
        )
        .await;
    assert!(matches!(missing, Err(DbError::NotFound { .. })));

    let stored = db.metadata().book_genres(book_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].genre_id, fantasy);
    assert!(stored[0].is_primary);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_genre_insert_restores_previous_set() {
    let db = setup_db().await;
    let (_, book_id) = seed_book(&db).await;
    let fantasy = create_option(&db, OptionType::Genre, "Fantasy").await;
    let horror = create_option(&db, OptionType::Genre, "Horror").await;
    let comedy = create_option(&db, OptionType::Genre, "Comedy").await;

    db.metadata()
        .assign_book_genres(
            book_id,
            &[GenreAssignment {
                genre_id: fantasy,
                is_primary: true,
            }],
        )
        .await
        .unwrap();

    sqlx::query(&format!(
        "CREATE TRIGGER reject_comedy BEFORE INSERT ON book_genres \
         WHEN NEW.genre_id = {} BEGIN SELECT RAISE(ABORT, 'no comedy'); END",
        comedy
    ))
    .execute(db.pool())
    .await
    .unwrap();

    // The old set is deleted and horror inserted before comedy fails.
    let result = db
        .metadata()
        .assign_book_genres(
            book_id,
            &[
                GenreAssignment {
                    genre_id: horror,
                    is_primary: true,
                },
                GenreAssignment {
                    genre_id: comedy,
                    is_primary: false,
                },
            ],
        )
        .await;
    assert!(result.is_err());

    let stored = db.metadata().book_genres(book_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].genre_id, fantasy);
}

#[test]
fn assignment_validation() {
    let primary = |genre_id| GenreAssignment {
        genre_id,
        is_primary: true,
    };
    let secondary = |genre_id| GenreAssignment {
        genre_id,
        is_primary: false,
    };

    assert!(validate_assignment(&[]).is_ok());
    assert!(validate_assignment(&[primary(1), secondary(2)]).is_ok());
    assert!(validate_assignment(&[primary(1), primary(2)]).is_err());
    assert!(validate_assignment(&[secondary(1), secondary(1)]).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn series_metadata_upserts() {
    let db = setup_db().await;
    let (series_id, _) = seed_book(&db).await;

    db.metadata()
        .set_series_metadata(series_id, "tone", Some("grim"))
        .await
        .unwrap();
    let updated = db
        .metadata()
        .set_series_metadata(series_id, "tone", Some("hopeful"))
        .await
        .unwrap();
    assert_eq!(updated.value.as_deref(), Some("hopeful"));

    db.metadata()
        .set_series_metadata(series_id, "audience", Some("adult"))
        .await
        .unwrap();

    let all = db.metadata().series_metadata(series_id, None).await.unwrap();
    let keys: Vec<&str> = all.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["audience", "tone"]);

    let tone = db
        .metadata()
        .series_metadata(series_id, Some("tone"))
        .await
        .unwrap();
    assert_eq!(tone.len(), 1);
    assert_eq!(tone[0].value.as_deref(), Some("hopeful"));
}

#[tokio::test(flavor = "multi_thread")]
async fn reads_for_missing_parents_are_not_found() {
    let db = setup_db().await;

    let genres = db.metadata().book_genres(404).await;
    assert!(matches!(
        genres,
        Err(DbError::NotFound { entity_type, id }) if entity_type == "Book" && id == "404"
    ));

    let metadata = db.metadata().series_metadata(404, None).await;
    assert!(matches!(
        metadata,
        Err(DbError::NotFound { entity_type, .. }) if entity_type == "Series"
    ));
}
