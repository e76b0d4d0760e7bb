use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    ChatRequest, Message, Notifier, OllamaError, Tool, ToolCall, ToolExecutionError, ToolRegistry,
};

use super::{
    assembler::chat_response_of,
    result::{ChatResult, GenerationResult},
    sinks::StreamSinks,
};

/// One model reply as seen by the resolver.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: Message,
    pub generation: GenerationResult,
}

/// Something that can run one chat round trip.
pub trait ChatBackend: Send + Sync {
    fn send_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        sinks: &'a StreamSinks,
    ) -> BoxFuture<'a, Result<ChatReply, OllamaError>>;
}

/// Runs the model, executes requested tools and feeds their results back,
/// for at most `max_rounds` rounds.
pub struct ToolCallResolver<'a, B: ?Sized> {
    backend: &'a B,
    registry: &'a ToolRegistry,
    notifier: &'a Notifier,
    max_rounds: usize,
}

impl<'a, B: ChatBackend + ?Sized> ToolCallResolver<'a, B> {
    pub fn new(backend: &'a B, registry: &'a ToolRegistry, notifier: &'a Notifier) -> Self {
        Self {
            backend,
            registry,
            notifier,
            max_rounds: 3,
        }
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Resolves `request` in place: the assistant reply of every round and one
    /// tool message per executed call are appended to `request.messages`, so
    /// whatever was appended before an error stays visible to the caller.
    /// `request.tools` is left as the caller set it.
    #[instrument(name = "tool_resolution", skip_all, fields(model = %request.base.model))]
    pub async fn resolve(
        &self,
        request: &mut ChatRequest,
        sinks: &StreamSinks,
    ) -> Result<ChatResult, OllamaError> {
        let tools = self.visible_tools(request);
        let caller_tools =
            std::mem::replace(&mut request.tools, (!tools.is_empty()).then(|| tools.clone()));
        let outcome = self.run_rounds(request, sinks, &tools).await;
        request.tools = caller_tools;
        outcome
    }

    async fn run_rounds(
        &self,
        request: &mut ChatRequest,
        sinks: &StreamSinks,
        tools: &[Tool],
    ) -> Result<ChatResult, OllamaError> {
        let max_rounds = if request.use_tools { self.max_rounds } else { 0 };

        let mut reply = self.invoke(request, sinks).await?;
        request.messages.push(reply.message.clone());

        let mut rounds = 0;
        while rounds < max_rounds {
            let Some(calls) = reply.message.tool_calls.clone().filter(|c| !c.is_empty()) else {
                break;
            };
            for call in &calls {
                let content = self.run_call(tools, call).await?;
                request
                    .messages
                    .push(Message::tool(content, call.function.name.clone()));
            }
            rounds += 1;

            reply = self.invoke(request, sinks).await?;
            request.messages.push(reply.message.clone());
        }

        if reply.message.requests_tools() && request.use_tools {
            warn!(rounds, "tool round limit reached, returning last reply unresolved");
        }

        Ok(ChatResult {
            message: reply.message,
            history: request.messages.clone(),
            generation: reply.generation,
            tool_rounds: rounds,
        })
    }

    /// Request-scoped tools first, then registered ones not shadowed by name.
    fn visible_tools(&self, request: &ChatRequest) -> Vec<Tool> {
        let mut tools = request.tools.clone().unwrap_or_default();
        if request.use_tools {
            for tool in self.registry.snapshot() {
                if !tools.iter().any(|t| t.name() == tool.name()) {
                    tools.push(tool);
                }
            }
        }
        tools
    }

    async fn invoke(
        &self,
        request: &ChatRequest,
        sinks: &StreamSinks,
    ) -> Result<ChatReply, OllamaError> {
        self.notifier.notify_prompt_request(request.clone()).await;
        match self.backend.send_chat(request, sinks).await {
            Ok(reply) => {
                self.notifier
                    .notify_prompt_success(chat_response_of(&reply.message, &reply.generation))
                    .await;
                Ok(reply)
            }
            Err(e) => {
                self.notifier.notify_prompt_error(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run_call(&self, tools: &[Tool], call: &ToolCall) -> Result<String, OllamaError> {
        let name = &call.function.name;
        info!(
            target: "tool",
            tool = %name,
            id = ?call.id,
            args = ?call.function.arguments,
            "executing tool call",
        );
        self.notifier.notify_tool_request(call.clone()).await;

        let Some(tool) = tools.iter().find(|t| t.name() == name) else {
            tracing::error!(target: "tool", tool = %name, "no corresponding tool registered");
            self.notifier
                .notify_tool_error(format!("Could not find tool: {name}"))
                .await;
            return Err(OllamaError::ToolNotFound(name.clone()));
        };

        match tool
            .execute(Value::Object(call.function.arguments.clone()))
            .await
        {
            Ok(output) => {
                info!(target: "tool", tool = %name, "tool call succeeded");
                self.notifier.notify_tool_success(output.clone()).await;
                Ok(format_tool_result(call, &output))
            }
            Err(ToolExecutionError::ToolNotFound(reason)) => {
                tracing::error!(target: "tool", tool = %name, %reason, "tool has no executor");
                self.notifier
                    .notify_tool_error(format!("Could not find tool: {name}"))
                    .await;
                Err(OllamaError::ToolNotFound(name.clone()))
            }
            Err(source) => {
                tracing::error!(target: "tool", tool = %name, error = %source, "tool call failed");
                self.notifier.notify_tool_error(source.to_string()).await;
                Err(OllamaError::ToolInvocation {
                    tool: name.clone(),
                    source,
                })
            }
        }
    }
}

/// Text fed back to the model for one executed call.
pub fn format_tool_result(call: &ToolCall, output: &str) -> String {
    format!(
        "[TOOL_RESULTS] {}({}): {} [/TOOL_RESULTS]",
        call.function.name,
        call.function.argument_keys(),
        output
    )
}
