use std::{fmt, sync::Arc};

use super::cancel::CancelToken;

/// Callback receiving one new fragment per invocation, never the cumulative text.
pub type TokenSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Side channels for a streamed call.
#[derive(Clone, Default)]
pub struct StreamSinks {
    pub thinking: Option<TokenSink>,
    pub response: Option<TokenSink>,
    pub cancel: Option<CancelToken>,
}

impl StreamSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_thinking<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.thinking = Some(Arc::new(f));
        self
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(f));
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn emit_thinking(&self, fragment: &str) {
        if let Some(sink) = &self.thinking {
            sink(fragment);
        }
    }

    pub(crate) fn emit_response(&self, fragment: &str) {
        if let Some(sink) = &self.response {
            sink(fragment);
        }
    }

    /// Resolves when the attached token is cancelled, never without one.
    pub(crate) async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }
}

impl fmt::Debug for StreamSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSinks")
            .field("thinking", &self.thinking.as_ref().map(|_| "<sink>"))
            .field("response", &self.response.as_ref().map(|_| "<sink>"))
            .field("cancel", &self.cancel)
            .finish()
    }
}
