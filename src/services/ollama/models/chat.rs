use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::{BaseRequest, InferenceOptions, Message, ThinkMode, Timings};
use crate::Tool;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Whether client-registered tools are offered and resolved for this call.
    #[serde(skip, default = "default_use_tools")]
    pub use_tools: bool,
}

fn default_use_tools() -> bool {
    true
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base: BaseRequest::new(model),
            messages: Vec::new(),
            tools: None,
            use_tools: true,
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages<I: IntoIterator<Item = Message>>(mut self, messages: I) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    pub fn use_tools(mut self, use_tools: bool) -> Self {
        self.use_tools = use_tools;
        self
    }

    pub fn options(mut self, options: InferenceOptions) -> Self {
        self.base.options = Some(options);
        self
    }

    pub fn format(mut self, format: Value) -> Self {
        self.base.format = Some(format);
        self
    }

    pub fn think(mut self, think: impl Into<ThinkMode>) -> Self {
        self.base.think = Some(think.into());
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.base.keep_alive = Some(keep_alive.into());
        self
    }
}

/// One record from the `/api/chat` endpoint, streamed or not.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(flatten)]
    pub timings: Timings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_flattens_base_and_hides_use_tools() {
        let req = ChatRequest::new("llama3")
            .message(Message::user("hi"))
            .think(true)
            .keep_alive("5m");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "llama3");
        assert_eq!(value["think"], true);
        assert_eq!(value["keep_alive"], "5m");
        assert!(value.get("use_tools").is_none());
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn terminal_record_carries_timings() {
        let rec: ChatResponse = serde_json::from_value(json!({
            "model": "llama3",
            "created_at": "2024-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "done_reason": "stop",
            "eval_count": 12,
            "total_duration": 99
        }))
        .unwrap();
        assert!(rec.done);
        assert_eq!(rec.timings.eval_count, Some(12));
        assert_eq!(rec.timings.total_duration, Some(99));
    }
}
