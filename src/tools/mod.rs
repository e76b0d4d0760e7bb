pub mod errors;
pub mod registry;
pub mod tool;
pub mod tool_builder;

pub use errors::{ToolBuilderError, ToolExecutionError, ToolRegistryError};
pub use registry::ToolRegistry;
pub use tool::{
    AsyncToolFn, Function, FunctionParameters, Property, Tool, ToolCall, ToolCallFunction, ToolType,
};
pub use tool_builder::ToolBuilder;
