//! Tests for Location MCP tools

use crate::db::{
    AuthorRepository, BookRepository, ChapterRepository, Database, NewAuthor, NewBook,
    NewChapter, NewSeries, PresenceType, SeriesRepository, SqliteDatabase,
};
use crate::mcp::tools::locations::{
    CreateLocationParams, DeleteLocationParams, GetLocationParams, ListLocationsParams,
    LocationTools, TrackLocationPresenceParams, UpdateLocationParams,
};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorCode, RawContent};
use std::sync::Arc;

/// Returns the database, the tools and a series id.
async fn setup() -> (Arc<SqliteDatabase>, LocationTools<SqliteDatabase>, i64) {
    let db = SqliteDatabase::in_memory().await.unwrap();
    db.migrate().await.unwrap();
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
            title: "Realm".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let db = Arc::new(db);
    let tools = LocationTools::new(db.clone());
    (db, tools, series.id)
}

fn text_of(result: &CallToolResult) -> &str {
    match &result.content[0].raw {
        RawContent::Text(text) => text.text.as_str(),
        _ => panic!("Expected text content"),
    }
}

fn new_location(series_id: i64, name: &str, parent: Option<i64>) -> CreateLocationParams {
    CreateLocationParams {
        series_id,
        name: name.to_string(),
        parent_location_id: parent,
        location_type: Some("city".to_string()),
        description: None,
        notable_features: None,
    }
}

fn empty_update(location_id: i64) -> UpdateLocationParams {
    UpdateLocationParams {
        location_id,
        name: None,
        parent_location_id: None,
        location_type: None,
        description: None,
        notable_features: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_location_shows_hierarchy_and_appearances() {
    let (db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Kingdom", None)))
        .await
        .unwrap();
    tools
        .create_location(Parameters(new_location(series_id, "Capital", Some(1))))
        .await
        .unwrap();
    tools
        .create_location(Parameters(new_location(series_id, "Docks", Some(2))))
        .await
        .unwrap();

    let book = db
        .books()
        .create(&NewBook {
            series_id,
            title: "Crown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let chapter = db
        .chapters()
        .create(&NewChapter {
            book_id: book.id,
            chapter_number: 3,
            ..Default::default()
        })
        .await
        .unwrap();
    tools
        .track_location_presence(Parameters(TrackLocationPresenceParams {
            chapter_id: chapter.id,
            location_id: 2,
            presence_type: Some(PresenceType::Flashback),
            notes: Some("Childhood memory".to_string()),
        }))
        .await
        .unwrap();

    let result = tools
        .get_location(Parameters(GetLocationParams { location_id: 2 }))
        .await
        .unwrap();
    let text = text_of(&result);

    assert!(text.contains("Location #2: Capital"));
    assert!(text.contains("Parent: 1 (Kingdom)"));
    assert!(text.contains("- #3 Docks (city)"));
    assert!(text.contains("- Crown, chapter 3 as flashback: Childhood memory"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_location_without_children_or_appearances() {
    let (_db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Hermitage", None)))
        .await
        .unwrap();

    let result = tools
        .get_location(Parameters(GetLocationParams { location_id: 1 }))
        .await
        .unwrap();
    let text = text_of(&result);

    assert!(text.contains("Parent: Not set"));
    assert!(text.contains("Sub-locations: None"));
    assert!(text.contains("Appears in: None"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_location_with_missing_parent() {
    let (_db, tools, series_id) = setup().await;

    let err = tools
        .create_location(Parameters(new_location(series_id, "Floating", Some(50))))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_location_cannot_parent_itself() {
    let (_db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Loop", None)))
        .await
        .unwrap();

    let err = tools
        .update_location(Parameters(UpdateLocationParams {
            parent_location_id: Some(Some(1)),
            ..empty_update(1)
        }))
        .await
        .unwrap_err();

    assert_eq!(
        err.message,
        "Failed to update location: A location cannot be its own parent"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_locations_by_type() {
    let (_db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Port", None)))
        .await
        .unwrap();
    tools
        .create_location(Parameters(CreateLocationParams {
            location_type: Some("forest".to_string()),
            ..new_location(series_id, "Deepwood", None)
        }))
        .await
        .unwrap();

    let result = tools
        .list_locations(Parameters(ListLocationsParams {
            series_id,
            location_type: Some("forest".to_string()),
        }))
        .await
        .unwrap();
    let text = text_of(&result);

    assert!(text.starts_with("Found 1 location(s)"));
    assert!(text.contains("Deepwood"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_track_presence_with_missing_chapter() {
    let (_db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Inn", None)))
        .await
        .unwrap();

    let err = tools
        .track_location_presence(Parameters(TrackLocationPresenceParams {
            chapter_id: 999,
            location_id: 1,
            presence_type: None,
            notes: None,
        }))
        .await
        .unwrap_err();

    assert_eq!(err.message, "Invalid chapter or location: not found");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_location_keeps_children() {
    let (_db, tools, series_id) = setup().await;
    tools
        .create_location(Parameters(new_location(series_id, "Top", None)))
        .await
        .unwrap();
    tools
        .create_location(Parameters(new_location(series_id, "Below", Some(1))))
        .await
        .unwrap();

    let result = tools
        .delete_location(Parameters(DeleteLocationParams { location_id: 1 }))
        .await
        .unwrap();
    assert_eq!(text_of(&result), "Deleted location #1: Top");

    let result = tools
        .get_location(Parameters(GetLocationParams { location_id: 2 }))
        .await
        .unwrap();
    assert!(text_of(&result).contains("Parent: Not set"));
}
