//! Async client for a local or remote Ollama server.
//!
//! Streamed responses are assembled into [`GenerationResult`]s, tool calls
//! requested by the model are resolved against a per-client [`ToolRegistry`],
//! and tools exposed by MCP servers can be registered alongside local ones.
//! An [`Agent`] keeps one conversation going across turns.

pub mod agent;
pub mod invocation;
pub mod notifications;
pub mod observability;
pub mod services;
pub mod tools;

pub use agent::{
    Agent, AgentBuildError, AgentBuilder, AgentSpec, DEFAULT_AGENT_REQUEST_TIMEOUT,
};
pub use invocation::{
    format_tool_result, CancelToken, ChatResult, GenerationResult, GenerationStreamer,
    StreamAssembler, StreamSinks, ToolCallResolver,
};
pub use notifications::{Notification, NotificationContent, Notifier, Token};
pub use observability::{init_default_tracing, init_tracing, TracingOptions};
pub use services::mcp::{McpConfig, McpIntegrationError, McpServerType};
pub use services::ollama::models::{
    BaseRequest, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, ErrorResponse,
    GenerateRequest, GenerateResponse, ImageData, InferenceOptions, Message, Model, ModelDetail,
    ModelMeta, OllamaError, PartialGeneration, PullStatus, Role, RunningModel, SchemaSpec,
    StreamFailure, StreamFailureKind, ThinkMode, Timings,
};
pub use services::ollama::{Auth, ClientBuilder, ClientConfig, OllamaClient};
pub use tools::{
    AsyncToolFn, Function, FunctionParameters, Property, Tool, ToolBuilder, ToolBuilderError,
    ToolCall, ToolCallFunction, ToolExecutionError, ToolRegistry, ToolRegistryError, ToolType,
};
