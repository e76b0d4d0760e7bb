use thiserror::Error;

use crate::{services::mcp::error::McpIntegrationError, ToolExecutionError};

use super::model::ErrorResponse;

/// What stopped a streamed read before a terminal record arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFailureKind {
    /// Reading the body failed.
    Io,
    /// A line was not the expected JSON shape.
    Decode,
    /// The body ended without a `done` record.
    Incomplete,
    /// The server sent an `{"error": ...}` line in the middle of a stream.
    ServerReported,
    /// The caller cancelled the call.
    Cancelled,
}

/// Text accumulated before a stream failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialGeneration {
    pub response: String,
    pub thinking: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub kind: StreamFailureKind,
    pub message: String,
    pub partial: PartialGeneration,
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            StreamFailureKind::Io => "read failed",
            StreamFailureKind::Decode => "undecodable line",
            StreamFailureKind::Incomplete => "ended without a final `done` record",
            StreamFailureKind::ServerReported => "reported an error",
            StreamFailureKind::Cancelled => "cancelled",
        };
        write!(
            f,
            "stream {kind}: {} ({} response bytes received)",
            self.message,
            self.partial.response.len()
        )
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Stream(Box<StreamFailure>),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool '{tool}' failed: {source}")]
    ToolInvocation {
        tool: String,
        #[source]
        source: ToolExecutionError,
    },

    #[error("model pull failed: {0}")]
    ModelPull(String),

    #[error("background generation failed: {0}")]
    Worker(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Mcp(#[from] McpIntegrationError),
}

impl OllamaError {
    pub(crate) fn stream(
        kind: StreamFailureKind,
        message: impl Into<String>,
        partial: PartialGeneration,
    ) -> Self {
        OllamaError::Stream(Box::new(StreamFailure {
            kind,
            message: message.into(),
            partial,
        }))
    }

    /// Partial text of a failed stream, if this error carries one.
    pub fn partial(&self) -> Option<&PartialGeneration> {
        match self {
            OllamaError::Stream(failure) => Some(&failure.partial),
            _ => None,
        }
    }

    /// True for a 404 from the server, how Ollama reports an unknown model.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OllamaError::Server { status: 404, .. })
    }
}

/// Builds the error for a non-success response from its body lines.
///
/// `{"error": "..."}` lines contribute their message, others their raw text.
pub(crate) fn server_error<I, S>(status: u16, body_lines: I) -> OllamaError
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let message = body_lines
        .into_iter()
        .filter_map(|line| error_line_text(line.as_ref().as_bytes()))
        .collect::<Vec<_>>()
        .join("\n");
    let message = if !message.is_empty() {
        message
    } else if status == 401 {
        "Unauthorized".to_string()
    } else {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("request failed")
            .to_string()
    };
    OllamaError::Server { status, message }
}

pub(crate) fn error_line_text(line: &[u8]) -> Option<String> {
    let text = match serde_json::from_slice::<ErrorResponse>(line) {
        Ok(body) => body.error,
        Err(_) => String::from_utf8_lossy(line).trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

impl From<serde_json::Error> for OllamaError {
    fn from(err: serde_json::Error) -> Self {
        OllamaError::Decode(err.to_string())
    }
}
