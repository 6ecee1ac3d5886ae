//! Tests for the MCP server registry and dispatch

use std::collections::HashSet;
use std::sync::Arc;

use rmcp::model::{CallToolRequestParams, CallToolResult, ErrorCode, RawContent};
use rmcp::service::RunningService;
use rmcp::{ErrorData, RoleClient, ServerHandler, ServiceError, ServiceExt};
use serde_json::json;

use crate::db::{Database, SqliteDatabase};
use crate::mcp::server::{McpServer, ServerProfile};
use crate::mcp::tools::{AuthorTools, ToolError, ToolGroup};

async fn setup_db() -> Arc<SqliteDatabase> {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Failed to run migrations");
    Arc::new(db)
}

/// Serve `server` over an in-memory pipe and return a connected client.
async fn connect(server: McpServer) -> RunningService<RoleClient, ()> {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        if let Ok(running) = server.serve(server_io).await {
            let _ = running.waiting().await;
        }
    });
    ().serve(client_io).await.expect("client should initialize")
}

async fn call(
    client: &RunningService<RoleClient, ()>,
    name: &str,
    arguments: serde_json::Value,
) -> Result<CallToolResult, ErrorData> {
    let arguments = arguments.as_object().cloned().unwrap_or_default();
    client
        .call_tool(CallToolRequestParams::new(name.to_string()).with_arguments(arguments))
        .await
        .map_err(|err| match err {
            ServiceError::McpError(data) => data,
            other => panic!("Transport failure calling {}: {}", name, other),
        })
}

fn text_of(result: &CallToolResult) -> &str {
    match &result.content[0].raw {
        RawContent::Text(text) => text.text.as_str(),
        _ => panic!("Expected text content"),
    }
}

fn names(server: &McpServer) -> Vec<String> {
    server.tools().iter().map(|t| t.name.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_info() {
    let server = McpServer::new(setup_db().await, ServerProfile::Books).unwrap();

    let info = server.get_info();

    assert!(info.capabilities.tools.is_some(), "Server should support tools");
    assert_eq!(
        info.instructions.as_deref(),
        Some("Folio book server - manage books, chapters and scenes")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_registry_names_are_unique() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();

    let names = names(&server);
    let unique: HashSet<&String> = names.iter().collect();

    assert_eq!(names.len(), unique.len());
    assert_eq!(names.len(), 49);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_every_registered_tool_has_a_handler() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();

    for tool in server.tools() {
        let handler = server.get_tool_handler(&tool.name);
        assert!(handler.is_some(), "No handler for {}", tool.name);
        assert_eq!(handler.unwrap().name(), tool.name);
        assert_eq!(server.get_tool(&tool.name).as_ref(), Some(tool));
    }
    assert!(server.get_tool_handler("delete_everything").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_every_tool_is_routed_over_the_session() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();
    let expected = names(&server);
    let client = connect(server).await;

    let listed: Vec<String> = client
        .list_all_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|tool| tool.name.to_string())
        .collect();
    assert_eq!(listed, expected);

    // Empty arguments either fail parameter parsing or reach the
    // handler, but never report the tool as unknown.
    for name in &expected {
        let result = call(&client, name, json!({})).await;
        assert!(
            !matches!(&result, Err(err) if err.code == ErrorCode::METHOD_NOT_FOUND),
            "{} did not dispatch",
            name
        );
    }

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_schemas_are_objects() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();

    for tool in server.tools() {
        assert_eq!(
            tool.input_schema.get("type"),
            Some(&json!("object")),
            "{} schema is not an object",
            tool.name
        );
        assert!(tool.description.is_some());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profiles_select_groups() {
    let db = setup_db().await;

    let series = McpServer::new(Arc::clone(&db), ServerProfile::Series).unwrap();
    let series_names = names(&series);
    assert!(series_names.contains(&"create_author".to_string()));
    assert!(series_names.contains(&"assign_book_genres".to_string()));
    assert!(!series_names.contains(&"create_book".to_string()));

    let world = McpServer::new(Arc::clone(&db), ServerProfile::World).unwrap();
    assert_eq!(world.tools().len(), 6);
    assert!(world.get_tool_handler("list_authors").is_none());

    let timeline = McpServer::new(Arc::clone(&db), ServerProfile::Timeline).unwrap();
    assert!(names(&timeline).contains(&"analyze_narrative_structure".to_string()));

    let total: usize = [
        ServerProfile::Series,
        ServerProfile::Books,
        ServerProfile::World,
        ServerProfile::Tropes,
        ServerProfile::Timeline,
    ]
    .into_iter()
    .map(|profile| McpServer::new(Arc::clone(&db), profile).unwrap().tools().len())
    .sum();
    let all = McpServer::new(db, ServerProfile::All).unwrap();
    assert_eq!(total, all.tools().len());
}

#[test]
fn test_profile_parsing() {
    assert_eq!("books".parse::<ServerProfile>(), Ok(ServerProfile::Books));
    assert_eq!("ALL".parse::<ServerProfile>(), Ok(ServerProfile::All));
    assert!("novels".parse::<ServerProfile>().is_err());
    assert_eq!(ServerProfile::default(), ServerProfile::All);
    assert_eq!(ServerProfile::World.to_string(), "world");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_duplicate_tool_names_fail_construction() {
    let db = setup_db().await;
    let groups: Vec<Arc<dyn ToolGroup>> = vec![
        Arc::new(AuthorTools::new(Arc::clone(&db))),
        Arc::new(AuthorTools::new(Arc::clone(&db))),
    ];

    let err = McpServer::from_groups(ServerProfile::Series, groups)
        .err()
        .expect("duplicate registration should fail");

    assert!(matches!(err, ToolError::DuplicateTool { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_tool_is_method_not_found() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();
    let client = connect(server).await;

    let err = call(&client, "delete_everything", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
    assert_eq!(err.message, "Unknown tool: delete_everything");
    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_outside_profile_is_unknown() {
    let server = McpServer::new(setup_db().await, ServerProfile::Books).unwrap();
    let client = connect(server).await;

    let err = call(&client, "list_authors", json!({})).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_arguments_are_invalid_params() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();
    let client = connect(server).await;

    let err = call(&client, "get_author", json!({"author_id": "one"}))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_round_trip_over_session() {
    let server = McpServer::new(setup_db().await, ServerProfile::All).unwrap();
    let client = connect(server).await;

    let info = client.peer_info().expect("server info after initialize");
    assert!(info.instructions.as_deref().unwrap_or_default().starts_with("Folio MCP server"));

    let created = call(&client, "create_author", json!({"name": "Ursula"}))
        .await
        .unwrap();
    assert!(text_of(&created).contains("Author #1: Ursula"));

    let fetched = call(&client, "get_author", json!({"author_id": 1}))
        .await
        .unwrap();
    assert!(text_of(&fetched).contains("Ursula"));

    let err = call(&client, "get_author", json!({"author_id": 42}))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);

    client.cancel().await.unwrap();
}
