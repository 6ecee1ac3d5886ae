//! Model Context Protocol (MCP) server implementation
//!
//! This module provides an MCP server using the Streamable HTTP transport.
//! The server exposes tools for the entities of a fiction project: authors,
//! series, books, chapters and scenes, locations, tropes and timelines.
//!
//! - **server**: `McpServer`, the tool registry and dispatcher for one
//!   `ServerProfile`
//! - **tools**: one tool group per entity family, each generic over
//!   `D: Database`
//! - **service**: the rmcp Streamable HTTP service mounted by the API layer

pub mod server;
mod service;
pub mod tools;

#[cfg(test)]
mod server_test;
#[cfg(test)]
mod service_test;

pub use server::{McpServer, ServerProfile, ToolHandler};
pub use service::create_mcp_service;
pub use tools::ToolError;
