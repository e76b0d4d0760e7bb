use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpIntegrationError {
    #[error("Failed to connect to MCP server: {0}")]
    ConnectionError(String),
    #[error("Failed to discover MCP actions: {0}")]
    DiscoveryError(String),
    #[error("Failed to convert MCP action to tool: {0}")]
    ToolConversionError(String),
    #[error("Invalid MCP server config: {0}")]
    ConfigError(String),
}
