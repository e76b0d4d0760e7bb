use std::{collections::BTreeMap, sync::Arc};

use rmcp::{
    model::{CallToolRequestParam, CallToolResult, ClientInfo, JsonObject},
    service::RunningService,
    transport::{ConfigureCommandExt, SseClientTransport, StreamableHttpClientTransport, TokioChildProcess},
    ClientHandler, ServiceExt,
};
use serde_json::Value;
use tokio::{
    process::Command,
    sync::{mpsc::Sender, Mutex},
};
use tracing::info;

use crate::{AsyncToolFn, Notification, NotificationContent, Tool, ToolBuilder, ToolExecutionError};

use super::error::McpIntegrationError;

/// A server started as a child process speaking MCP over stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServer {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl StdioServer {
    /// Splits a command line on whitespace: program first, then arguments.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            env: BTreeMap::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpServerType {
    Sse(String),
    Stdio(StdioServer),
    StreamableHttp(String),
}

impl McpServerType {
    pub fn sse<S: Into<String>>(url: S) -> Self {
        McpServerType::Sse(url.into())
    }
    pub fn stdio(command_line: &str) -> Result<Self, McpIntegrationError> {
        StdioServer::parse(command_line)
            .map(McpServerType::Stdio)
            .ok_or_else(|| McpIntegrationError::ConnectionError("Invalid command.".into()))
    }
    pub fn streamable_http<S: Into<String>>(url: S) -> Self {
        McpServerType::StreamableHttp(url.into())
    }
}

pub type McpClient = Arc<Mutex<RunningService<rmcp::RoleClient, ClientMcpHandler>>>;

/// Forwards MCP progress notifications into a client's notification channel.
#[derive(Clone)]
pub struct ClientMcpHandler {
    notification_tx: Option<Sender<Notification>>,
    client_info: ClientInfo,
}

impl ClientMcpHandler {
    pub fn new(notification_tx: Option<Sender<Notification>>) -> Self {
        Self {
            notification_tx,
            client_info: ClientInfo::default(),
        }
    }
}

impl ClientHandler for ClientMcpHandler {
    async fn on_progress(
        &self,
        params: rmcp::model::ProgressNotificationParam,
        _context: rmcp::service::NotificationContext<rmcp::RoleClient>,
    ) {
        tracing::debug!(?params, "received MCP progress notification");
        let Some(tx) = &self.notification_tx else {
            return;
        };
        let payload = serde_json::to_string(&params)
            .unwrap_or_else(|e| format!("Failed to serialize MCP notification: {e}"));
        let notification = Notification::new(
            "mcp".to_string(),
            NotificationContent::McpToolNotification(payload),
        );
        if tx.send(notification).await.is_err() {
            tracing::warn!("Notification channel closed. Cannot forward MCP notification.");
        }
    }

    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }
}

/// Connects to `server` and wraps each tool it lists as a [`Tool`] whose
/// executor calls back into the server.
pub async fn get_mcp_tools(
    server: McpServerType,
    notification_channel: Option<Sender<Notification>>,
) -> Result<Vec<Tool>, McpIntegrationError> {
    let handler = ClientMcpHandler::new(notification_channel);
    let (client, raw_tools) = match server {
        McpServerType::Sse(url) => {
            let transport = SseClientTransport::start(url)
                .await
                .map_err(|e| McpIntegrationError::ConnectionError(e.to_string()))?;
            connect(handler.serve(transport).await).await?
        }
        McpServerType::StreamableHttp(url) => {
            let transport = StreamableHttpClientTransport::from_uri(url);
            connect(handler.serve(transport).await).await?
        }
        McpServerType::Stdio(stdio) => {
            let command = Command::new(&stdio.program).configure(|cmd| {
                cmd.args(&stdio.args);
                cmd.envs(&stdio.env);
            });
            let transport = TokioChildProcess::new(command)
                .map_err(|e| McpIntegrationError::ConnectionError(e.to_string()))?;
            connect(handler.serve(transport).await).await?
        }
    };

    info!(count = raw_tools.len(), "discovered MCP tools");

    raw_tools
        .into_iter()
        .map(|def| {
            let executor = mcp_executor(Arc::clone(&client), def.name.to_string());
            let tool = tool_from_mcp_definition(
                &def.name,
                def.description.as_deref(),
                &def.input_schema,
                executor,
            )?;
            info!(tool = %def.name, "converted MCP tool");
            Ok(tool)
        })
        .collect()
}

async fn connect<E: std::fmt::Display>(
    served: Result<RunningService<rmcp::RoleClient, ClientMcpHandler>, E>,
) -> Result<(McpClient, Vec<rmcp::model::Tool>), McpIntegrationError> {
    let client = served.map_err(|e| McpIntegrationError::ConnectionError(e.to_string()))?;
    let tool_list = client
        .list_tools(Default::default())
        .await
        .map_err(|e| McpIntegrationError::DiscoveryError(e.to_string()))?;
    Ok((Arc::new(Mutex::new(client)), tool_list.tools))
}

fn mcp_executor(client: McpClient, action: String) -> AsyncToolFn {
    Arc::new(move |args: Value| {
        let client = Arc::clone(&client);
        let action = action.clone();
        Box::pin(async move {
            let client = client.lock().await;
            let result = client
                .call_tool(CallToolRequestParam {
                    name: action.clone().into(),
                    arguments: args.as_object().cloned(),
                })
                .await
                .map_err(|e| {
                    ToolExecutionError::ExecutionFailed(format!(
                        "MCP tool '{action}' execution failed: {e}"
                    ))
                })?;
            let CallToolResult { content, is_error } = result;
            let text = content
                .iter()
                .filter_map(|c| c.as_text().map(|t| t.text.as_str()))
                .collect::<Vec<_>>()
                .join("\n");
            if is_error == Some(true) {
                return Err(ToolExecutionError::ExecutionFailed(format!(
                    "MCP tool '{action}' reported an error: {text}"
                )));
            }
            Ok(text)
        })
    })
}

/// Builds a [`Tool`] from an MCP tool's name, description and JSON input schema.
pub fn tool_from_mcp_definition(
    name: &str,
    description: Option<&str>,
    input_schema: &JsonObject,
    executor: AsyncToolFn,
) -> Result<Tool, McpIntegrationError> {
    let mut builder = ToolBuilder::new()
        .function_name(name)
        .function_description(description.unwrap_or_default())
        .executor(executor);

    let mut declared = Vec::new();
    if let Some(Value::Object(properties)) = input_schema.get("properties") {
        for (prop_name, schema) in properties {
            let Value::Object(details) = schema else {
                continue;
            };
            let property_type = details
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string");
            let prop_description = details
                .get("description")
                .or_else(|| details.get("title"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let enum_values: Option<Vec<String>> = details.get("enum").and_then(Value::as_array).map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            });

            builder = match enum_values {
                Some(values) => builder.add_enum_property(prop_name, prop_description, values),
                None => builder.add_property(prop_name, property_type, prop_description),
            };
            declared.push(prop_name.as_str());
        }
    }

    if let Some(Value::Array(required)) = input_schema.get("required") {
        for req in required.iter().filter_map(Value::as_str) {
            if declared.contains(&req) {
                builder = builder.add_required_property(req);
            }
        }
    }

    builder
        .build()
        .map_err(|e| McpIntegrationError::ToolConversionError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> AsyncToolFn {
        Arc::new(|_| Box::pin(async { Ok(String::new()) }))
    }

    #[test]
    fn input_schema_becomes_tool_parameters() {
        let schema = json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "file to read"},
                "lines": {"type": "integer", "title": "Line count"},
                "mode": {"type": "string", "enum": ["text", "hex"]}
            },
            "required": ["path", "ghost"]
        });
        let tool = tool_from_mcp_definition(
            "read_file",
            Some("Read a file"),
            schema.as_object().unwrap(),
            noop(),
        )
        .unwrap();

        let params = &tool.function.parameters;
        assert_eq!(tool.function.description, "Read a file");
        assert_eq!(params.properties["lines"].property_type, "integer");
        assert_eq!(params.properties["lines"].description, "Line count");
        assert_eq!(
            params.properties["mode"].enum_values,
            Some(vec!["text".to_string(), "hex".to_string()])
        );
        assert_eq!(params.required, vec!["path".to_string()]);
    }

    #[test]
    fn stdio_command_line_is_split() {
        let server = McpServerType::stdio("uvx  mcp-server-time --local-timezone UTC").unwrap();
        match server {
            McpServerType::Stdio(s) => {
                assert_eq!(s.program, "uvx");
                assert_eq!(s.args, vec!["mcp-server-time", "--local-timezone", "UTC"]);
            }
            other => panic!("unexpected server type: {other:?}"),
        }
        assert!(McpServerType::stdio("   ").is_err());
    }
}
