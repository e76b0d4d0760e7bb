use thiserror::Error;

use crate::{McpIntegrationError, OllamaError};

/// Errors that can occur while building an [`Agent`](super::Agent).
#[derive(Debug, Error)]
pub enum AgentBuildError {
    /// Required model was not set on the builder.
    #[error("Model not set.")]
    ModelNotSet,
    /// Failure while compiling tools from an MCP server.
    #[error("Mcp error: {0}")]
    Mcp(#[from] McpIntegrationError),
    /// Failure initializing the underlying client.
    #[error("Client error: {0}")]
    Client(#[from] OllamaError),
    /// An agent definition could not be read or parsed.
    #[error("Invalid agent definition: {0}")]
    InvalidSpec(String),
}

impl From<serde_json::Error> for AgentBuildError {
    fn from(err: serde_json::Error) -> Self {
        AgentBuildError::InvalidSpec(err.to_string())
    }
}

impl From<std::io::Error> for AgentBuildError {
    fn from(err: std::io::Error) -> Self {
        AgentBuildError::InvalidSpec(err.to_string())
    }
}
