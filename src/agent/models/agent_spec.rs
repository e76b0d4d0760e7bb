use std::{collections::HashMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    tools::registry::bind_executors, AgentBuilder, AgentBuildError, AsyncToolFn, ClientConfig, Tool,
};

use super::agent_builder::DEFAULT_AGENT_REQUEST_TIMEOUT;

/// An agent described in a JSON file.
///
/// Tools use the same definition format as
/// [`ToolRegistry::register_from_json`](crate::ToolRegistry::register_from_json)
/// and are bound to executors by name when the spec becomes a builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    /// Zero or absent means [`DEFAULT_AGENT_REQUEST_TIMEOUT`].
    #[serde(default)]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl AgentSpec {
    pub fn from_json(json: &str) -> Result<Self, AgentBuildError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentBuildError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// A builder for this agent. Tools with no matching executor are kept
    /// and fail with `ToolNotFound` when the model calls them.
    pub fn into_builder(self, executors: &HashMap<String, AsyncToolFn>) -> AgentBuilder {
        let timeout = match self.request_timeout_seconds {
            0 => DEFAULT_AGENT_REQUEST_TIMEOUT,
            secs => Duration::from_secs(secs),
        };
        let conf = ClientConfig {
            base_url: self.host,
            request_timeout: Some(timeout),
            ..Default::default()
        };

        let mut builder = AgentBuilder::default()
            .set_name(self.name)
            .set_model(self.model)
            .import_client_config(conf);
        if let Some(prompt) = self.custom_prompt {
            builder = builder.set_system_prompt(prompt);
        }
        for tool in bind_executors(self.tools, executors) {
            builder = builder.add_tool(tool);
        }
        builder
    }
}
