pub mod config;
pub mod error;
pub mod mcp_tool_builder;

pub use config::{McpConfig, McpServerEntry};
pub use error::McpIntegrationError;
pub use mcp_tool_builder::{get_mcp_tools, tool_from_mcp_definition, McpServerType, StdioServer};
