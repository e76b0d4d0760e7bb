use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ToolExecutionError;

/// Defines the type of tool available. Currently, only 'function' is supported.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

/// Signature for an asynchronous tool executor function.
///
/// Accepts a JSON [`Value`] of arguments and produces a `String` result
/// or a [`ToolExecutionError`] if execution fails.
pub type AsyncToolFn = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String, ToolExecutionError>> + Send>>
        + Send
        + Sync,
>;

/// Executor for tools that were deserialized and never bound to a function.
pub(crate) fn unbound_executor(name: String) -> AsyncToolFn {
    Arc::new(move |_| {
        let name = name.clone();
        Box::pin(async move {
            Err(ToolExecutionError::ToolNotFound(format!(
                "no executor bound to tool '{name}'"
            )))
        })
    })
}

fn default_executor() -> AsyncToolFn {
    unbound_executor(String::from("<deserialized>"))
}

/// Defines a tool (function) that the model can call.
#[derive(Serialize, Clone, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: Function,
    #[serde(skip, default = "default_executor")]
    pub executor: AsyncToolFn,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("tool_type", &self.tool_type)
            .field("function", &self.function)
            .field("executor", &"<async_fn>")
            .finish()
    }
}

impl Tool {
    /// Convenience method to execute the tool
    pub async fn execute(&self, args: Value) -> Result<String, ToolExecutionError> {
        (self.executor)(args).await
    }

    /// Gets the name of the tool from its function definition.
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Replaces the executor, keeping the definition.
    pub fn with_executor(mut self, executor: AsyncToolFn) -> Self {
        self.executor = executor;
        self
    }
}

/// Defines a function, its description, and its arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: FunctionParameters,
}

/// Defines the arguments for a function using a JSON schema-like structure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionParameters {
    #[serde(rename = "type", default = "object_type")]
    pub param_type: String,
    #[serde(default)]
    pub properties: HashMap<String, Property>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

/// Defines a single property within function arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Property {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Represents a tool call requested by the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Ollama usually omits the type, so it defaults to [`ToolType::Function`].
    #[serde(
        rename = "type",
        default = "default_tool_call_type",
        skip_serializing_if = "is_default_tool_call_type"
    )]
    pub tool_type: ToolType,
    pub function: ToolCallFunction,
}

fn default_tool_call_type() -> ToolType {
    ToolType::Function
}

fn is_default_tool_call_type(tool_type: &ToolType) -> bool {
    *tool_type == default_tool_call_type()
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: None,
            tool_type: ToolType::Function,
            function: ToolCallFunction {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Contains the name and arguments for a function call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallFunction {
    /// Argument names, in map order, joined by `", "`.
    pub fn argument_keys(&self) -> String {
        self.arguments
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
