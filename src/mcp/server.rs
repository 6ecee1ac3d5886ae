//! MCP server implementation
//!
//! `McpServer` owns one instance of every tool group selected by a
//! [`ServerProfile`] and the registry of their tool definitions. Each group
//! routes its own calls through an rmcp `ToolRouter`; the registry is built
//! once in [`McpServer::new`] and never changes afterwards.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use tracing::{debug, instrument};

use crate::db::Database;

use super::tools::{
    AuthorTools, BookTools, ChapterTools, LocationTools, MetadataTools, SeriesTools,
    TimelineTools, ToolError, ToolGroup, TropeTools,
};

/// Which tool families a server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerProfile {
    /// Authors, series and lookup metadata.
    Series,
    /// Books, chapters and scenes.
    Books,
    /// Locations.
    World,
    Tropes,
    Timeline,
    #[default]
    All,
}

impl ServerProfile {
    pub const ALL: [ServerProfile; 6] = [
        ServerProfile::Series,
        ServerProfile::Books,
        ServerProfile::World,
        ServerProfile::Tropes,
        ServerProfile::Timeline,
        ServerProfile::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerProfile::Series => "series",
            ServerProfile::Books => "books",
            ServerProfile::World => "world",
            ServerProfile::Tropes => "tropes",
            ServerProfile::Timeline => "timeline",
            ServerProfile::All => "all",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            ServerProfile::Series => {
                "Folio series server - manage authors, series, genres and other lookup options"
            }
            ServerProfile::Books => "Folio book server - manage books, chapters and scenes",
            ServerProfile::World => {
                "Folio world server - manage locations and where they appear in chapters"
            }
            ServerProfile::Tropes => {
                "Folio trope server - track tropes, their scene types and how books use them"
            }
            ServerProfile::Timeline => {
                "Folio timeline server - manage timeline events, map them to chapters and analyze narrative order"
            }
            ServerProfile::All => {
                "Folio MCP server - manage authors, series, books, chapters, locations, tropes and timelines of fiction projects"
            }
        }
    }
}

impl fmt::Display for ServerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Unknown profile '{}'. Expected one of: series, books, world, tropes, timeline, all",
                    s
                )
            })
    }
}

/// A resolved tool: the owning group plus the tool definition.
pub struct ToolHandler<'a> {
    tool: &'a Tool,
    group: &'a dyn ToolGroup,
}

impl<'a> ToolHandler<'a> {
    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn tool(&self) -> &Tool {
        self.tool
    }

    /// Run the handler through the group's router.
    pub fn call(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> BoxFuture<'a, Result<CallToolResult, ErrorData>> {
        self.group.call_tool(request, context)
    }
}

/// Main MCP server coordinator
#[derive(Clone)]
pub struct McpServer {
    profile: ServerProfile,
    groups: Vec<Arc<dyn ToolGroup>>,
    tools: Arc<[Tool]>,
}

impl McpServer {
    /// Create a server exposing the groups of `profile`, all sharing `db`.
    ///
    /// Fails with [`ToolError::DuplicateTool`] when two groups declare the
    /// same tool name.
    pub fn new<D: Database + 'static>(
        db: Arc<D>,
        profile: ServerProfile,
    ) -> Result<Self, ToolError> {
        let mut groups: Vec<Arc<dyn ToolGroup>> = Vec::new();

        if matches!(profile, ServerProfile::Series | ServerProfile::All) {
            groups.push(Arc::new(AuthorTools::new(Arc::clone(&db))));
            groups.push(Arc::new(SeriesTools::new(Arc::clone(&db))));
            groups.push(Arc::new(MetadataTools::new(Arc::clone(&db))));
        }
        if matches!(profile, ServerProfile::Books | ServerProfile::All) {
            groups.push(Arc::new(BookTools::new(Arc::clone(&db))));
            groups.push(Arc::new(ChapterTools::new(Arc::clone(&db))));
        }
        if matches!(profile, ServerProfile::World | ServerProfile::All) {
            groups.push(Arc::new(LocationTools::new(Arc::clone(&db))));
        }
        if matches!(profile, ServerProfile::Tropes | ServerProfile::All) {
            groups.push(Arc::new(TropeTools::new(Arc::clone(&db))));
        }
        if matches!(profile, ServerProfile::Timeline | ServerProfile::All) {
            groups.push(Arc::new(TimelineTools::new(Arc::clone(&db))));
        }

        Self::from_groups(profile, groups)
    }

    pub(crate) fn from_groups(
        profile: ServerProfile,
        groups: Vec<Arc<dyn ToolGroup>>,
    ) -> Result<Self, ToolError> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();

        for group in &groups {
            for tool in group.definitions() {
                if !seen.insert(tool.name.to_string()) {
                    return Err(ToolError::DuplicateTool {
                        name: tool.name.to_string(),
                    });
                }
                tools.push(tool);
            }
        }

        debug!(profile = %profile, tools = tools.len(), "Built tool registry");

        Ok(Self {
            profile,
            groups,
            tools: tools.into(),
        })
    }

    pub fn profile(&self) -> ServerProfile {
        self.profile
    }

    /// Every tool this server advertises, grouped by family.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get_tool_handler(&self, name: &str) -> Option<ToolHandler<'_>> {
        let tool = self.tools.iter().find(|tool| tool.name == name)?;
        let group = self.groups.iter().find(|group| group.has_tool(name))?;
        Some(ToolHandler {
            tool,
            group: group.as_ref(),
        })
    }

    /// Route a tool call to the group that registered the tool.
    #[instrument(skip_all, fields(tool = %request.name))]
    pub async fn dispatch(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(handler) = self.get_tool_handler(&request.name) else {
            return Err(ToolError::UnknownTool {
                name: request.name.to_string(),
            }
            .into());
        };
        handler.call(request, context).await
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_instructions(self.profile.instructions())
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.tools.to_vec())))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.get_tool_handler(name).map(|handler| handler.tool().clone())
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        self.dispatch(request, context)
    }
}
