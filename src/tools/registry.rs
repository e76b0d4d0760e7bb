use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{debug, warn};

use super::{
    errors::ToolRegistryError,
    tool::{unbound_executor, AsyncToolFn, Tool},
};

/// Name-keyed set of tools owned by one client.
///
/// Clones share the same table. Readers take a [`snapshot`](Self::snapshot)
/// so a call in flight never observes registrations made after it started.
#[derive(Clone, Default, Debug)]
pub struct ToolRegistry {
    tools: Arc<RwLock<Vec<Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool` unless one with the same name is already present.
    /// Returns whether the tool was added.
    pub fn register(&self, tool: Tool) -> bool {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.iter().any(|t| t.name() == tool.name()) {
            debug!(tool = %tool.name(), "tool already registered, keeping the first one");
            return false;
        }
        tools.push(tool);
        true
    }

    pub fn register_all<I: IntoIterator<Item = Tool>>(&self, tools: I) -> usize {
        let mut added = 0;
        for tool in tools {
            if self.register(tool) {
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Registered tools in registration order.
    pub fn snapshot(&self) -> Vec<Tool> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Registers tool definitions given as a JSON array, binding each to the
    /// executor of the same name in `executors`.
    ///
    /// Definitions with no matching executor are still registered; calling
    /// them fails with [`ToolExecutionError::ToolNotFound`](crate::ToolExecutionError).
    pub fn register_from_json(
        &self,
        json: &str,
        executors: &HashMap<String, AsyncToolFn>,
    ) -> Result<usize, ToolRegistryError> {
        let definitions: Vec<Tool> = serde_json::from_str(json)?;
        Ok(self.register_all(bind_executors(definitions, executors)))
    }

    pub fn register_from_file(
        &self,
        path: impl AsRef<Path>,
        executors: &HashMap<String, AsyncToolFn>,
    ) -> Result<usize, ToolRegistryError> {
        let json = std::fs::read_to_string(path)?;
        self.register_from_json(&json, executors)
    }
}

/// Binds each definition to the executor of the same name, or to one that
/// fails with `ToolNotFound`.
pub(crate) fn bind_executors(
    definitions: Vec<Tool>,
    executors: &HashMap<String, AsyncToolFn>,
) -> Vec<Tool> {
    definitions
        .into_iter()
        .map(|tool| {
            let executor = match executors.get(tool.name()) {
                Some(exec) => Arc::clone(exec),
                None => {
                    warn!(tool = %tool.name(), "no executor supplied for tool definition");
                    unbound_executor(tool.name().to_string())
                }
            };
            tool.with_executor(executor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ToolBuilder, ToolExecutionError};
    use serde_json::json;

    fn tool(name: &str, answer: &'static str) -> Tool {
        ToolBuilder::new()
            .function_name(name)
            .function_description("test tool")
            .executor_fn(move |_| async move { Ok(answer.to_string()) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let registry = ToolRegistry::new();
        assert!(registry.register(tool("echo", "first")));
        assert!(!registry.register(tool("echo", "second")));
        assert_eq!(registry.len(), 1);
        let out = registry.get("echo").unwrap().execute(json!({})).await.unwrap();
        assert_eq!(out, "first");
    }

    #[test]
    fn snapshot_is_isolated_from_later_changes() {
        let registry = ToolRegistry::new();
        registry.register(tool("a", "1"));
        let snap = registry.snapshot();
        registry.register(tool("b", "2"));
        registry.clear();
        assert_eq!(snap.len(), 1);
        assert!(registry.is_empty());
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn clones_share_the_table() {
        let registry = ToolRegistry::new();
        let other = registry.clone();
        other.register(tool("shared", "x"));
        assert_eq!(registry.names(), vec!["shared".to_string()]);
    }

    #[tokio::test]
    async fn json_definitions_bind_executors_by_name() {
        let defs = json!([
            {"type": "function", "function": {"name": "upper", "description": "uppercase",
              "parameters": {"type": "object", "properties": {"s": {"type": "string", "description": "input"}}, "required": ["s"]}}},
            {"type": "function", "function": {"name": "orphan", "description": "no impl",
              "parameters": {"type": "object", "properties": {}}}}
        ])
        .to_string();

        let mut executors: HashMap<String, AsyncToolFn> = HashMap::new();
        executors.insert(
            "upper".into(),
            Arc::new(|args| {
                Box::pin(async move { Ok(args["s"].as_str().unwrap_or_default().to_uppercase()) })
            }),
        );

        let registry = ToolRegistry::new();
        assert_eq!(registry.register_from_json(&defs, &executors).unwrap(), 2);

        let upper = registry.get("upper").unwrap();
        assert_eq!(upper.function.parameters.required, vec!["s".to_string()]);
        assert_eq!(upper.execute(json!({"s": "hi"})).await.unwrap(), "HI");

        let err = registry.get("orphan").unwrap().execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::ToolNotFound(_)));
    }

    #[test]
    fn malformed_definitions_are_rejected() {
        let registry = ToolRegistry::new();
        let err = registry.register_from_json("{not json", &HashMap::new()).unwrap_err();
        assert!(matches!(err, ToolRegistryError::InvalidDefinitions(_)));
        assert!(registry.is_empty());
    }
}
