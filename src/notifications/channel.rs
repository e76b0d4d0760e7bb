use tokio::sync::mpsc::Sender;

use crate::{ChatRequest, ChatResponse, PullStatus, ToolCall};

use super::notification::{Notification, NotificationContent, Response, Success, Token};

/// Optional outgoing side of a notification channel.
///
/// With no sender attached every `notify*` call is a no-op returning `false`.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<Sender<Notification>>,
    name: String,
}

impl Notifier {
    pub fn new(sender: Option<Sender<Notification>>, name: impl Into<String>) -> Self {
        Self {
            sender,
            name: name.into(),
        }
    }

    pub fn sender(&self) -> Option<&Sender<Notification>> {
        self.sender.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.sender.is_some()
    }

    /// Send a notification with the given content.
    ///
    /// Waits for channel capacity. Returns `true` if delivered.
    pub async fn notify(&self, content: NotificationContent) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender
            .send(Notification::new(self.name.clone(), content))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed sending notification");
                false
            }
        }
    }

    pub async fn notify_done(&self, success: Success, resp: Response) -> bool {
        self.notify(NotificationContent::Done(success, resp)).await
    }
    pub async fn notify_prompt_request(&self, req: ChatRequest) -> bool {
        self.notify(NotificationContent::PromptRequest(req)).await
    }
    pub async fn notify_prompt_success(&self, resp: ChatResponse) -> bool {
        self.notify(NotificationContent::PromptSuccessResult(resp)).await
    }
    pub async fn notify_prompt_error(&self, error_message: String) -> bool {
        self.notify(NotificationContent::PromptErrorResult(error_message))
            .await
    }
    pub async fn notify_tool_request(&self, tool_call: ToolCall) -> bool {
        self.notify(NotificationContent::ToolCallRequest(tool_call)).await
    }
    pub async fn notify_tool_success(&self, tool_result: String) -> bool {
        self.notify(NotificationContent::ToolCallSuccessResult(tool_result))
            .await
    }
    pub async fn notify_tool_error(&self, error_message: String) -> bool {
        self.notify(NotificationContent::ToolCallErrorResult(error_message))
            .await
    }
    pub async fn notify_token(&self, token: Token) -> bool {
        self.notify(NotificationContent::Token(token)).await
    }
    pub async fn notify_pull_progress(&self, status: PullStatus) -> bool {
        self.notify(NotificationContent::PullProgress(status)).await
    }
    pub async fn notify_mcp_tool_notification(&self, notification: String) -> bool {
        self.notify(NotificationContent::McpToolNotification(notification))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn detached_notifier_reports_nothing_sent() {
        let notifier = Notifier::default();
        assert!(!notifier.notify_token(Token::response("x")).await);
    }

    #[tokio::test]
    async fn notifications_carry_source_name() {
        let (tx, mut rx) = mpsc::channel(4);
        let notifier = Notifier::new(Some(tx), "ollama");
        assert!(notifier.notify_token(Token::thinking("hmm")).await);
        let n = rx.recv().await.unwrap();
        assert_eq!(n.source, "ollama");
        match n.content {
            NotificationContent::Token(t) => assert!(t.is_thinking()),
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_receiver_is_not_fatal() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let notifier = Notifier::new(Some(tx), "ollama");
        assert!(!notifier.notify_tool_error("boom".into()).await);
    }
}
