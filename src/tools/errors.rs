use thiserror::Error;

/// Errors that can occur during execution of a tool.
///
/// These errors indicate failures in parsing arguments, actually
/// running the tool, or locating the requested tool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolExecutionError {
    /// The provided arguments could not be parsed or were invalid.
    #[error("Tool argument parsing error: {0}")]
    ArgumentParsingError(String),
    /// The tool failed during execution (runtime failure inside the tool).
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
    /// The requested tool has no executor bound to it.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolBuilderError {
    #[error("Function name is required.")]
    MissingFunctionName,
    #[error("Function description is required.")]
    MissingFunctionDescription,
    #[error("Executor function is required for the tool.")]
    MissingExecutor,
    #[error("Required property '{0}' was never declared.")]
    UnknownRequiredProperty(String),
}

#[derive(Debug, Error)]
pub enum ToolRegistryError {
    #[error("invalid tool definitions: {0}")]
    InvalidDefinitions(#[from] serde_json::Error),
    #[error("failed to read tool definitions: {0}")]
    Io(#[from] std::io::Error),
}
