use std::time::Duration;

use tracing::info;

use crate::{
    services::mcp::get_mcp_tools, Agent, AgentBuildError, ClientBuilder, ClientConfig,
    InferenceOptions, McpServerType, OllamaClient, Tool,
};

/// Timeout on a whole agent call when the builder creates the client.
pub const DEFAULT_AGENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A builder for [`Agent`].
///
/// ```no_run
/// use ollama4rs::{AgentBuilder, StreamSinks};
///
/// async {
///     let mut agent = AgentBuilder::default()
///         // model must be set, everything else is optional
///         .set_name("helper")
///         .set_model("llama3.2")
///         .set_system_prompt("Answer in one sentence.")
///         .build()
///         .await
///         .unwrap();
///     let answer = agent.interact("Why is the sky blue?", StreamSinks::default()).await;
/// };
/// ```
#[derive(Debug, Default)]
pub struct AgentBuilder {
    /// Name used in the system prompt and in logs
    name: Option<String>,
    /// Model identifier passed to the server
    model: Option<String>,
    /// Text appended to the generated system prompt
    system_prompt: Option<String>,
    /// Local tools offered on every turn
    tools: Option<Vec<Tool>>,
    /// MCP servers whose tools are added at build time
    mcp_servers: Option<Vec<McpServerType>>,
    /// Ready client; takes precedence over `client_config`
    client: Option<OllamaClient>,
    client_config: Option<ClientConfig>,
    options: Option<InferenceOptions>,
}

impl AgentBuilder {
    pub fn set_name<T>(mut self, name: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(name.into());
        self
    }

    pub fn set_model<T: Into<String>>(mut self, model: T) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn set_system_prompt<T: Into<String>>(mut self, prompt: T) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Use an existing client, sharing its registry and notification channel.
    pub fn set_client(mut self, client: OllamaClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Settings for the client the builder creates. Without a request
    /// timeout, [`DEFAULT_AGENT_REQUEST_TIMEOUT`] applies.
    pub fn import_client_config(mut self, conf: ClientConfig) -> Self {
        self.client_config = Some(conf);
        self
    }

    pub fn set_base_url<T: Into<String>>(mut self, base_url: T) -> Self {
        let conf = self.client_config.take().unwrap_or_default();
        self.client_config = Some(conf.base_url(base_url));
        self
    }

    pub fn set_options(mut self, options: InferenceOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Add a local tool.
    pub fn add_tool(mut self, tool: Tool) -> Self {
        if let Some(ref mut vec) = self.tools {
            vec.push(tool);
        } else {
            self.tools = Some(vec![tool]);
        }
        self
    }

    /// Add an MCP server endpoint.
    pub fn add_mcp_server(mut self, server: McpServerType) -> Self {
        if let Some(ref mut svs) = self.mcp_servers {
            svs.push(server);
        } else {
            self.mcp_servers = Some(vec![server]);
        }
        self
    }

    /// Creates the client if none was set and connects to every MCP server.
    pub async fn build(self) -> Result<Agent, AgentBuildError> {
        let model = self.model.ok_or(AgentBuildError::ModelNotSet)?;

        let name = match self.name {
            Some(n) => n,
            None => format!("Agent-{model}"),
        };

        let client = match self.client {
            Some(client) => client,
            None => {
                let mut conf = self.client_config.unwrap_or_default();
                if conf.request_timeout.is_none() {
                    conf.request_timeout = Some(DEFAULT_AGENT_REQUEST_TIMEOUT);
                }
                conf.build()?
            }
        };

        let mut tools = self.tools.unwrap_or_default();
        for server in self.mcp_servers.unwrap_or_default() {
            let mcp_tools = get_mcp_tools(server, client.notification_sender()).await?;
            info!(agent = %name, count = mcp_tools.len(), "added MCP tools");
            for tool in mcp_tools {
                if !tools.iter().any(|t| t.name() == tool.name()) {
                    tools.push(tool);
                }
            }
        }

        let mut agent = Agent::new(name, client, model, self.system_prompt, tools);
        agent.options = self.options;
        Ok(agent)
    }
}
