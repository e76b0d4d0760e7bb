use std::{fs, path::Path};

use tracing::{debug, instrument};

use crate::{ChatRequest, InferenceOptions, Message, OllamaClient, OllamaError, StreamSinks, Tool};

/// A named conversation with one model and a fixed set of tools.
///
/// History persists across [`interact`](Agent::interact) calls. The first
/// turn seeds it with a system prompt that names the agent and lists its tools.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub model: String,
    pub(crate) custom_prompt: Option<String>,
    pub(crate) tools: Vec<Tool>,
    pub(crate) options: Option<InferenceOptions>,
    pub(crate) history: Vec<Message>,
    pub(crate) client: OllamaClient,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        client: OllamaClient,
        model: impl Into<String>,
        custom_prompt: Option<String>,
        tools: Vec<Tool>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            custom_prompt,
            tools,
            options: None,
            history: Vec::new(),
            client,
        }
    }

    /// One chat turn with tool resolution.
    ///
    /// On failure the history keeps the user message and whatever the
    /// resolver appended before the error.
    #[instrument(name = "agent.interact", skip_all, fields(agent = %self.name, model = %self.model))]
    pub async fn interact(
        &mut self,
        input: impl Into<String>,
        sinks: StreamSinks,
    ) -> Result<String, OllamaError> {
        if self.history.is_empty() {
            self.history.push(Message::system(self.system_prompt()));
        }
        self.history.push(Message::user(input));

        let mut request = ChatRequest::new(&self.model)
            .messages(self.history.clone())
            .use_tools(true);
        if !self.tools.is_empty() {
            request.tools = Some(self.tools.clone());
        }
        if let Some(options) = &self.options {
            request = request.options(options.clone());
        }
        request.base.stream = Some(sinks.thinking.is_some() || sinks.response.is_some());

        let outcome = self.client.resolve_chat(&mut request, &sinks).await;
        self.history = request.messages;
        let result = outcome?;
        debug!(rounds = result.tool_rounds, history = self.history.len(), "agent turn finished");
        Ok(result.message.content)
    }

    /// The prompt seeded on the first turn.
    pub fn system_prompt(&self) -> String {
        let tools = if self.tools.is_empty() {
            String::new()
        } else {
            let lines = self
                .tools
                .iter()
                .map(|t| {
                    let description = match t.function.description.as_str() {
                        "" => "No description",
                        d => d,
                    };
                    format!("- {}: {}", t.name(), description)
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("\nYou have access to the following tools:\n{lines}")
        };
        format!(
            "You are a helpful AI assistant named {}. Your actions are limited to using the available tools. {}{}",
            self.name,
            self.custom_prompt.as_deref().unwrap_or_default(),
            tools
        )
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Forget the conversation. The next turn seeds a fresh system prompt.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Persist the conversation history to disk in pretty-printed JSON.
    pub fn save_history<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(&self.history)?;
        fs::write(path, json_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolBuilder;

    fn agent(tools: Vec<Tool>, custom: Option<&str>) -> Agent {
        let client = OllamaClient::new("http://localhost:11434").unwrap();
        Agent::new("Ada", client, "llama3.2", custom.map(String::from), tools)
    }

    #[test]
    fn system_prompt_names_the_agent_and_lists_tools() {
        let weather = ToolBuilder::new()
            .function_name("weather")
            .function_description("current weather for a city")
            .executor_fn(|_| async { Ok("sunny".to_string()) })
            .build()
            .unwrap();
        let mut quiet = weather.clone();
        quiet.function.name = "quiet".into();
        quiet.function.description.clear();

        let prompt = agent(vec![weather, quiet], Some("Answer briefly.")).system_prompt();
        assert_eq!(
            prompt,
            "You are a helpful AI assistant named Ada. Your actions are limited to using the available tools. \
             Answer briefly.\nYou have access to the following tools:\n\
             - weather: current weather for a city\n- quiet: No description"
        );
    }

    #[test]
    fn system_prompt_without_tools_has_no_tool_section() {
        let prompt = agent(Vec::new(), None).system_prompt();
        assert!(prompt.starts_with("You are a helpful AI assistant named Ada."));
        assert!(!prompt.contains("following tools"));
    }

    #[test]
    fn history_round_trips_through_a_file() {
        let mut a = agent(Vec::new(), None);
        a.history = vec![Message::system("s"), Message::user("hi")];
        let path = std::env::temp_dir().join(format!("agent-history-{}.json", std::process::id()));
        a.save_history(&path).unwrap();
        let saved: Vec<Message> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].content, "hi");

        a.clear_history();
        assert!(a.history().is_empty());
    }
}
