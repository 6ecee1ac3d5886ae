//! MCP tools for Location management.

use rmcp::{
    ErrorData as McpError,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::CallToolResult,
    schemars,
    schemars::JsonSchema,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    Database, Location, LocationRepository, LocationUpdate, NewLocation, NewPresence,
    PresenceType,
};
use crate::mcp::tools::{NONE, RoutedTools, map_db_error, map_fk_error, or_not_set, text_result};

// =============================================================================
// Parameter Structs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListLocationsParams {
    #[schemars(description = "Series ID whose locations to list")]
    pub series_id: i64,
    #[schemars(description = "Only list locations of this type, e.g. 'city' (optional)")]
    pub location_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetLocationParams {
    #[schemars(description = "Location ID")]
    pub location_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateLocationParams {
    #[schemars(description = "Series ID the location belongs to")]
    pub series_id: i64,
    #[schemars(description = "Location name, unique within the series")]
    pub name: String,
    #[schemars(
        description = "Enclosing location ID (optional). Must belong to the same series."
    )]
    pub parent_location_id: Option<i64>,
    #[schemars(description = "Free-form type such as 'city', 'tavern', 'planet' (optional)")]
    pub location_type: Option<String>,
    #[schemars(description = "Description (optional)")]
    pub description: Option<String>,
    #[schemars(description = "Notable features worth keeping consistent (optional)")]
    pub notable_features: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateLocationParams {
    #[schemars(description = "Location ID to update")]
    pub location_id: i64,
    #[schemars(description = "New name (optional)")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<i64>",
        description = "New enclosing location (optional). Pass null to make it top-level."
    )]
    pub parent_location_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New type (optional). Pass null to clear."
    )]
    pub location_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New description (optional). Pass null to clear."
    )]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
    #[schemars(
        with = "Option<String>",
        description = "New notable features (optional). Pass null to clear."
    )]
    pub notable_features: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteLocationParams {
    #[schemars(
        description = "Location ID to delete. Sub-locations become top-level; chapter presence records are removed."
    )]
    pub location_id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TrackLocationPresenceParams {
    #[schemars(description = "Chapter ID in which the location appears")]
    pub chapter_id: i64,
    #[schemars(description = "Location ID")]
    pub location_id: i64,
    #[schemars(description = "How it appears: 'setting' (default), 'mentioned', 'flashback'")]
    pub presence_type: Option<PresenceType>,
    #[schemars(description = "Notes about this appearance (optional)")]
    pub notes: Option<String>,
}

// =============================================================================
// Location Tools
// =============================================================================

#[derive(Clone)]
pub struct LocationTools<D: Database> {
    db: Arc<D>,
    tool_router: ToolRouter<Self>,
}

fn format_location(location: &Location, parent_name: Option<&str>) -> String {
    let parent = match (location.parent_location_id, parent_name) {
        (Some(id), Some(name)) => format!("{} ({})", id, name),
        (id, _) => or_not_set(id),
    };
    format!(
        "Location #{}: {}\nSeries: {}\nType: {}\nParent: {}\nDescription: {}\nNotable features: {}",
        location.id,
        location.name,
        location.series_id,
        or_not_set(location.location_type.as_deref()),
        parent,
        or_not_set(location.description.as_deref()),
        or_not_set(location.notable_features.as_deref()),
    )
}

#[tool_router]
impl<D: Database + 'static> LocationTools<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List a series' locations. Filter by location_type.")]
    pub async fn list_locations(
        &self,
        Parameters(params): Parameters<ListLocationsParams>,
    ) -> Result<CallToolResult, McpError> {
        let locations = self
            .db
            .locations()
            .list(params.series_id, params.location_type.as_deref())
            .await
            .map_err(map_db_error("Failed to list locations"))?;

        if locations.is_empty() {
            return text_result(format!(
                "No locations found for series {}.",
                params.series_id
            ));
        }

        let mut text = format!("Found {} location(s):\n", locations.len());
        for location in &locations {
            let parent = location
                .parent_location_id
                .map(|id| format!(", inside #{}", id))
                .unwrap_or_default();
            text.push_str(&format!(
                "\n- #{} {} ({}){}",
                location.id,
                location.name,
                or_not_set(location.location_type.as_deref()),
                parent
            ));
        }
        text_result(text)
    }

    #[tool(description = "Get a location with its parent, sub-locations and chapter appearances.")]
    pub async fn get_location(
        &self,
        Parameters(params): Parameters<GetLocationParams>,
    ) -> Result<CallToolResult, McpError> {
        let detail = self
            .db
            .locations()
            .get(params.location_id)
            .await
            .map_err(map_db_error("Failed to get location"))?;

        let mut text = format_location(&detail.location, detail.parent_name.as_deref());

        text.push_str("\n\nSub-locations:");
        if detail.children.is_empty() {
            text.push_str(&format!(" {}", NONE));
        }
        for child in &detail.children {
            text.push_str(&format!(
                "\n- #{} {} ({})",
                child.id,
                child.name,
                or_not_set(child.location_type.as_deref())
            ));
        }

        text.push_str("\n\nAppears in:");
        if detail.appearances.is_empty() {
            text.push_str(&format!(" {}", NONE));
        }
        for appearance in &detail.appearances {
            text.push_str(&format!(
                "\n- {}, chapter {} as {}{}",
                appearance.book_title,
                appearance.chapter_number,
                appearance.presence_type,
                appearance
                    .notes
                    .as_deref()
                    .map(|n| format!(": {}", n))
                    .unwrap_or_default()
            ));
        }

        text_result(text)
    }

    #[tool(
        description = "Create a location in a series, optionally nested inside another location."
    )]
    pub async fn create_location(
        &self,
        Parameters(params): Parameters<CreateLocationParams>,
    ) -> Result<CallToolResult, McpError> {
        let location = self
            .db
            .locations()
            .create(&NewLocation {
                series_id: params.series_id,
                parent_location_id: params.parent_location_id,
                name: params.name,
                location_type: params.location_type,
                description: params.description,
                notable_features: params.notable_features,
            })
            .await
            .map_err(map_fk_error(
                "Failed to create location",
                "Invalid series or parent location: not found",
            ))?;

        text_result(format!(
            "Created location\n\n{}",
            format_location(&location, None)
        ))
    }

    #[tool(description = "Update a location. Only the provided fields change.")]
    pub async fn update_location(
        &self,
        Parameters(params): Parameters<UpdateLocationParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = LocationUpdate {
            parent_location_id: params.parent_location_id,
            name: params.name,
            location_type: params.location_type,
            description: params.description,
            notable_features: params.notable_features,
        };

        let location = self
            .db
            .locations()
            .update(params.location_id, &update)
            .await
            .map_err(map_fk_error(
                "Failed to update location",
                "Invalid parent location: not found",
            ))?;

        text_result(format!(
            "Updated location\n\n{}",
            format_location(&location, None)
        ))
    }

    #[tool(description = "Delete a location. Sub-locations are kept and become top-level.")]
    pub async fn delete_location(
        &self,
        Parameters(params): Parameters<DeleteLocationParams>,
    ) -> Result<CallToolResult, McpError> {
        let location = self
            .db
            .locations()
            .delete(params.location_id)
            .await
            .map_err(map_db_error("Failed to delete location"))?;

        text_result(format!(
            "Deleted location #{}: {}",
            location.id, location.name
        ))
    }

    #[tool(description = "Record that a location appears in a chapter.")]
    pub async fn track_location_presence(
        &self,
        Parameters(params): Parameters<TrackLocationPresenceParams>,
    ) -> Result<CallToolResult, McpError> {
        let presence = NewPresence {
            chapter_id: params.chapter_id,
            location_id: params.location_id,
            presence_type: params.presence_type.unwrap_or_default(),
            notes: params.notes,
        };

        let id = self
            .db
            .locations()
            .add_presence(&presence)
            .await
            .map_err(map_fk_error(
                "Failed to track location presence",
                "Invalid chapter or location: not found",
            ))?;

        text_result(format!(
            "Tracked location {} in chapter {} as {} (presence id {})",
            presence.location_id, presence.chapter_id, presence.presence_type, id
        ))
    }
}

impl<D: Database + 'static> RoutedTools for LocationTools<D> {
    fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }
}
