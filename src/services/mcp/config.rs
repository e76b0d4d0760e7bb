use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use super::{error::McpIntegrationError, mcp_tool_builder::{McpServerType, StdioServer}};

/// The `{"mcpServers": {...}}` file format used by MCP desktop clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct McpServerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// SSE endpoint, for servers not started as a child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl McpConfig {
    pub fn from_json_str(json: &str) -> Result<Self, McpIntegrationError> {
        serde_json::from_str(json).map_err(|e| McpIntegrationError::ConfigError(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, McpIntegrationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            McpIntegrationError::ConfigError(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Servers in name order. Entries with neither `command` nor `url` are skipped.
    pub fn servers(&self) -> impl Iterator<Item = (String, McpServerType)> + '_ {
        self.mcp_servers.iter().filter_map(|(name, entry)| {
            let server = match (&entry.command, &entry.url) {
                (Some(command), _) => McpServerType::Stdio(StdioServer {
                    program: command.clone(),
                    args: entry.args.clone(),
                    env: entry.env.clone(),
                }),
                (None, Some(url)) => McpServerType::Sse(url.clone()),
                (None, None) => {
                    tracing::warn!(server = %name, "MCP server entry has no command or url");
                    return None;
                }
            };
            Some((name.clone(), server))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desktop_style_config() {
        let cfg = McpConfig::from_json_str(
            r#"{
                "mcpServers": {
                    "files": {"command": "npx", "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]},
                    "remote": {"url": "http://localhost:8000/sse"},
                    "broken": {}
                }
            }"#,
        )
        .unwrap();

        let servers: Vec<_> = cfg.servers().collect();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].0, "files");
        match &servers[0].1 {
            McpServerType::Stdio(stdio) => {
                assert_eq!(stdio.program, "npx");
                assert_eq!(stdio.args.len(), 3);
            }
            other => panic!("unexpected server type: {other:?}"),
        }
        assert_eq!(servers[1].1, McpServerType::sse("http://localhost:8000/sse"));
    }

    #[test]
    fn malformed_config_is_reported() {
        let err = McpConfig::from_json_str("{\"mcpServers\": 3}").unwrap_err();
        assert!(matches!(err, McpIntegrationError::ConfigError(_)));
    }
}
