use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{ChatRequest, ChatResponse, PullStatus, ToolCall};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Name of the client that emitted the notification.
    pub source: String,
    pub content: NotificationContent,
    pub timestamp_millis: u128,
}

impl Notification {
    pub fn new(source: String, content: NotificationContent) -> Self {
        Self {
            source,
            content,
            timestamp_millis: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationContent {
    Done(Success, Response),
    PromptRequest(ChatRequest),
    PromptSuccessResult(ChatResponse),
    PromptErrorResult(String),
    ToolCallRequest(ToolCall),
    ToolCallSuccessResult(String),
    ToolCallErrorResult(String),
    Token(Token),
    PullProgress(PullStatus),
    McpToolNotification(String),
}

pub type Success = bool;
pub type Response = Option<String>;

/// A streamed fragment. `tag` is `Some("thinking")` for reasoning tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub tag: Option<String>,
    pub value: String,
}

pub const THINKING_TAG: &str = "thinking";

impl Token {
    pub fn response(value: impl Into<String>) -> Self {
        Self {
            tag: None,
            value: value.into(),
        }
    }

    pub fn thinking(value: impl Into<String>) -> Self {
        Self {
            tag: Some(THINKING_TAG.to_string()),
            value: value.into(),
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.tag.as_deref() == Some(THINKING_TAG)
    }
}
