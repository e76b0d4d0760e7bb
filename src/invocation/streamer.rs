use futures::Stream;
use tokio::{
    sync::mpsc::{self, error::TryRecvError, Receiver},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, Instrument};

use crate::{GenerateRequest, OllamaClient, OllamaError, Token};

use super::{cancel::CancelToken, result::GenerationResult, sinks::StreamSinks};

/// Handle to a generation running on a background task.
///
/// Tokens are buffered up to the channel capacity; while the buffer is full
/// the worker stops reading the response body until the caller catches up.
pub struct GenerationStreamer {
    tokens: Receiver<Token>,
    cancel: CancelToken,
    worker: JoinHandle<Result<GenerationResult, OllamaError>>,
}

impl GenerationStreamer {
    pub(crate) fn spawn(client: OllamaClient, mut request: GenerateRequest, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancelToken::new();
        let sinks = StreamSinks::new().with_cancel(cancel.clone());
        request.base.stream = Some(true);

        let span = tracing::info_span!("generate_async", model = %request.base.model);
        let worker = tokio::spawn(
            async move {
                let outcome = client.run_generate(request, &sinks, Some(&tx)).await;
                debug!(ok = outcome.is_ok(), "background generation finished");
                outcome
            }
            .instrument(span),
        );

        Self {
            tokens: rx,
            cancel,
            worker,
        }
    }

    /// Waits for the next fragment. `None` once the worker is finished and
    /// every buffered fragment was taken.
    pub async fn next_token(&mut self) -> Option<Token> {
        self.tokens.recv().await
    }

    /// Takes a buffered fragment without waiting.
    pub fn try_next_token(&mut self) -> Option<Token> {
        match self.tokens.try_recv() {
            Ok(token) => Some(token),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the worker and returns its result. Unread fragments are
    /// discarded, which also releases a worker blocked on a full channel.
    pub async fn join(self) -> Result<GenerationResult, OllamaError> {
        let Self { tokens, worker, .. } = self;
        drop(tokens);
        worker
            .await
            .map_err(|e| OllamaError::Worker(e.to_string()))?
    }

    /// Splits into a token stream and the worker's result.
    pub fn into_parts(
        self,
    ) -> (
        impl Stream<Item = Token>,
        CancelToken,
        JoinHandle<Result<GenerationResult, OllamaError>>,
    ) {
        (ReceiverStream::new(self.tokens), self.cancel, self.worker)
    }
}
