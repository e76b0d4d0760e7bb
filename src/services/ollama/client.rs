use std::{fmt, future::Future, time::Duration};

use futures::{future::BoxFuture, Stream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    time::Instant,
};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::{
    invocation::{
        assembler::{Assembled, StreamAssembler, StreamRecord},
        resolver::{ChatBackend, ChatReply, ToolCallResolver},
        result::{ChatResult, GenerationResult},
        sinks::StreamSinks,
        streamer::GenerationStreamer,
    },
    services::mcp::{config::McpConfig, mcp_tool_builder::get_mcp_tools, McpServerType},
    ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, ErrorResponse, GenerateRequest,
    GenerateResponse, Message, Model, ModelDetail, Notification, Notifier, OllamaError,
    PartialGeneration, PullStatus, RunningModel, StreamFailureKind, Token, Tool, ToolRegistry,
};

use super::{
    client_config::{
        Auth, ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_TOOL_ROUNDS, PULL_RETRY_BASE_DELAY,
    },
    lines::ndjson_lines,
    models::{
        errors::server_error,
        model::{
            ListModelsResponse, PullRequest, RunningModelsResponse, ShowModelRequest,
            VersionResponse,
        },
    },
};

/// Client for one Ollama server.
///
/// Cloning is cheap; clones share the HTTP connection pool and the tool registry.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    auth: Option<Auth>,
    read_timeout: Option<Duration>,
    max_tool_rounds: usize,
    pull_retries: u32,
    pull_retry_delay: Duration,
    registry: ToolRegistry,
    notifier: Notifier,
    name: String,
}

impl TryFrom<ClientConfig> for OllamaClient {
    type Error = OllamaError;

    fn try_from(cfg: ClientConfig) -> Result<Self, Self::Error> {
        let mut headers = HeaderMap::new();
        for (key, value) in cfg.extra_headers.iter().flatten() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| OllamaError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| OllamaError::Config(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT));
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| OllamaError::Config(e.to_string()))?;

        let name = cfg.name.clone().unwrap_or_else(|| "ollama".to_string());
        Ok(Self {
            client,
            base_url: cfg.resolved_base_url(),
            auth: cfg.auth,
            read_timeout: cfg.read_timeout,
            max_tool_rounds: cfg.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            pull_retries: cfg.pull_retries.unwrap_or(0),
            pull_retry_delay: cfg.pull_retry_delay.unwrap_or(PULL_RETRY_BASE_DELAY),
            registry: ToolRegistry::new(),
            notifier: Notifier::new(None, name.clone()),
            name,
        })
    }
}

impl OllamaClient {
    /// Client for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, OllamaError> {
        Self::try_from(ClientConfig {
            base_url: Some(base_url.into()),
            ..Default::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A clone whose calls publish [`Notification`]s into a bounded channel.
    pub fn with_notifications(&self, capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut client = self.clone();
        client.notifier = Notifier::new(Some(tx), self.name.clone());
        (client, rx)
    }

    pub(crate) fn notification_sender(&self) -> Option<Sender<Notification>> {
        self.notifier.sender().cloned()
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, endpoint));
        match &self.auth {
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, OllamaError> {
        let response = request.send().await.map_err(|e| {
            Span::current().set_status(opentelemetry::trace::Status::Error {
                description: e.to_string().into(),
            });
            OllamaError::Transport(e)
        })?;
        Span::current().set_attribute(
            "http.response.status_code",
            response.status().as_u16() as i64,
        );
        Ok(response)
    }

    async fn read_json<R: DeserializeOwned>(response: Response) -> Result<R, OllamaError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %text, "request failed");
            Span::current().set_status(opentelemetry::trace::Status::Error {
                description: format!("HTTP {status}").into(),
            });
            return Err(server_error(status.as_u16(), text.lines()));
        }
        serde_json::from_str(&text).map_err(|e| {
            error!(%e, raw = %text, "deserialization error");
            OllamaError::Decode(format!("{e}. Raw JSON was: '{text}'"))
        })
    }

    async fn get_json<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, OllamaError> {
        let span = info_span!(
            "ollama.http",
            "http.request.method" = "GET",
            "url.full" = format!("{}{}", self.base_url, endpoint).as_str(),
        );
        async {
            let response = self.send(self.request(Method::GET, endpoint)).await?;
            Self::read_json(response).await
        }
        .instrument(span)
        .await
    }

    async fn post_json<T, R>(&self, endpoint: &str, body: &T) -> Result<R, OllamaError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let span = info_span!(
            "ollama.http",
            "http.request.method" = "POST",
            "url.full" = format!("{}{}", self.base_url, endpoint).as_str(),
        );
        if let Ok(input) = serde_json::to_string(body) {
            span.set_attribute("http.request.body", input);
        }
        async {
            let response = self
                .send(self.request(Method::POST, endpoint).json(body))
                .await?;
            Self::read_json(response).await
        }
        .instrument(span)
        .await
    }

    /// POSTs `body` and assembles the newline-delimited records of the reply.
    ///
    /// `tap` receives every fragment and is awaited, so a full channel slows
    /// the read loop down instead of growing a queue.
    pub(crate) async fn stream_records<T, R>(
        &self,
        endpoint: &str,
        body: &T,
        sinks: &StreamSinks,
        tap: Option<&Sender<Token>>,
    ) -> Result<Assembled<R>, OllamaError>
    where
        T: Serialize + HasStreamFlag + Sync + ?Sized,
        R: StreamRecord + DeserializeOwned,
    {
        let streaming = body.is_streaming();
        let span = info_span!(
            "ollama.http",
            "http.request.method" = "POST",
            "url.full" = format!("{}{}", self.base_url, endpoint).as_str(),
            stream = streaming,
            records = tracing::field::Empty,
        );
        if let Ok(input) = serde_json::to_string(body) {
            span.set_attribute("http.request.body", input);
        }

        async {
            let started = Instant::now();
            let request = self.request(Method::POST, endpoint).json(body);
            let response = tokio::select! {
                biased;
                _ = sinks.cancelled() => {
                    return Err(OllamaError::stream(
                        StreamFailureKind::Cancelled,
                        "cancelled before the response arrived",
                        PartialGeneration::default(),
                    ));
                }
                response = within(self.read_timeout, self.send(request)) => match response {
                    Some(response) => response?,
                    None => {
                        warn!(idle = ?self.read_timeout, "no response headers within the read timeout");
                        return Err(OllamaError::stream(
                            StreamFailureKind::Io,
                            format!("no response within {:?}", self.read_timeout.unwrap_or_default()),
                            PartialGeneration::default(),
                        ));
                    }
                },
            };

            let status = response.status();
            debug!(%status, "received response");

            let lines = ndjson_lines(response.bytes_stream());
            futures::pin_mut!(lines);

            let mut asm = StreamAssembler::<R>::new(sinks.clone());
            let mut records = 0usize;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = sinks.cancelled() => {
                        warn!(records, "stream cancelled by caller");
                        return Err(asm.fail(StreamFailureKind::Cancelled, "cancelled by caller"));
                    }
                    next = next_within(&mut lines, self.read_timeout) => next,
                };

                let line = match next {
                    None => {
                        return Err(asm.fail(
                            StreamFailureKind::Io,
                            format!("no data received for {:?}", self.read_timeout.unwrap_or_default()),
                        ))
                    }
                    Some(None) => break,
                    Some(Some(Err(e))) => {
                        Span::current().set_status(opentelemetry::trace::Status::Error {
                            description: e.to_string().into(),
                        });
                        return Err(asm.fail(StreamFailureKind::Io, e.to_string()));
                    }
                    Some(Some(Ok(line))) => line,
                };

                if !status.is_success() {
                    asm.push_error_line(&line);
                    continue;
                }

                if let Ok(body) = serde_json::from_slice::<ErrorResponse>(&line) {
                    error!(error = %body.error, "server reported an error mid-stream");
                    return Err(asm.fail(StreamFailureKind::ServerReported, body.error));
                }

                let record = match serde_json::from_slice::<R>(&line) {
                    Ok(record) => record,
                    Err(e) => {
                        error!(%e, raw = %String::from_utf8_lossy(&line), "deserialization error");
                        return Err(asm.fail(StreamFailureKind::Decode, e.to_string()));
                    }
                };
                records += 1;

                let step = asm.push(record);
                if let Some(fragment) = step.fragment.filter(|_| streaming) {
                    let token = fragment.into_token();
                    let delivered = async {
                        if let Some(tap) = tap {
                            if tap.send(token.clone()).await.is_err() {
                                debug!("token receiver dropped");
                            }
                        }
                        self.notifier.notify_token(token).await;
                    };
                    tokio::select! {
                        biased;
                        _ = sinks.cancelled() => {
                            warn!(records, "stream cancelled while delivering a token");
                            return Err(asm.fail(StreamFailureKind::Cancelled, "cancelled by caller"));
                        }
                        _ = delivered => {}
                    }
                }
                if step.done {
                    break;
                }
            }

            Span::current().record("records", records);
            let assembled = asm.finish(status.as_u16(), started.elapsed());
            match &assembled {
                Ok(_) => Span::current().set_status(opentelemetry::trace::Status::Ok),
                Err(e) => {
                    error!(error = %e, "stream failed");
                    Span::current().set_status(opentelemetry::trace::Status::Error {
                        description: e.to_string().into(),
                    });
                }
            }
            assembled
        }
        .instrument(span)
        .await
    }

    /// True if the server answers `/api/tags` with 200.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn ping(&self) -> Result<bool, OllamaError> {
        let response = self.send(self.request(Method::GET, "/api/tags")).await?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }

    #[instrument(skip(self))]
    pub async fn version(&self) -> Result<String, OllamaError> {
        let v: VersionResponse = self.get_json("/api/version").await?;
        Ok(v.version)
    }

    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<Model>, OllamaError> {
        let list: ListModelsResponse = self.get_json("/api/tags").await?;
        Ok(list.models)
    }

    /// Models currently loaded in memory.
    #[instrument(skip(self))]
    pub async fn running_models(&self) -> Result<Vec<RunningModel>, OllamaError> {
        let list: RunningModelsResponse = self.get_json("/api/ps").await?;
        Ok(list.models)
    }

    #[instrument(skip(self))]
    pub async fn show_model(&self, name: &str) -> Result<ModelDetail, OllamaError> {
        self.post_json("/api/show", &ShowModelRequest { model: name })
            .await
    }

    /// Pulls `name`, retrying `pull_retries` times with exponential backoff.
    #[instrument(skip(self))]
    pub async fn pull_model(&self, name: &str) -> Result<(), OllamaError> {
        let mut attempt = 0u32;
        loop {
            match self.pull_once(name).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.pull_retries => {
                    let delay = self.pull_retry_delay * 2u32.saturating_pow(attempt);
                    warn!(model = name, attempt = attempt + 1, ?delay, error = %e, "model pull failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn pull_once(&self, name: &str) -> Result<(), OllamaError> {
        let request = self
            .request(Method::POST, "/api/pull")
            .json(&PullRequest {
                model: name,
                stream: true,
            });
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(server_error(status.as_u16(), text.lines()));
        }

        let lines = ndjson_lines(response.bytes_stream());
        futures::pin_mut!(lines);
        let mut succeeded = false;
        while let Some(line) = lines.next().await {
            let progress: PullStatus = serde_json::from_slice(&line?)?;
            if let Some(err) = progress.error.as_deref().filter(|e| !e.is_empty()) {
                return Err(OllamaError::ModelPull(err.to_string()));
            }
            debug!(status = %progress.status, completed = ?progress.completed, total = ?progress.total, "pull progress");
            succeeded |= progress.status == "success";
            self.notifier.notify_pull_progress(progress).await;
        }

        if succeeded {
            info!(model = name, "model pulled");
            Ok(())
        } else {
            Err(OllamaError::ModelPull(format!(
                "pull of '{name}' ended without a success status"
            )))
        }
    }

    #[instrument(skip(self, request), fields(model = %request.model, inputs = request.input.len()))]
    pub async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, OllamaError> {
        self.post_json("/api/embed", &request).await
    }

    /// One-shot generation; the whole answer arrives in one record.
    pub async fn generate(&self, mut request: GenerateRequest) -> Result<GenerationResult, OllamaError> {
        request.base.stream = Some(false);
        self.run_generate(request, &StreamSinks::default(), None).await
    }

    /// Streamed generation with fragments dispatched to `sinks` as they arrive.
    pub async fn generate_with_sinks(
        &self,
        mut request: GenerateRequest,
        sinks: StreamSinks,
    ) -> Result<GenerationResult, OllamaError> {
        request.base.stream = Some(true);
        self.run_generate(request, &sinks, None).await
    }

    /// Streamed generation on a background task, fragments delivered through
    /// a channel holding at most `capacity` tokens.
    pub fn generate_async(&self, request: GenerateRequest, capacity: usize) -> GenerationStreamer {
        GenerationStreamer::spawn(self.clone(), request, capacity)
    }

    #[instrument(name = "generate", skip_all, fields(model = %request.base.model, stream = ?request.base.stream))]
    pub(crate) async fn run_generate(
        &self,
        request: GenerateRequest,
        sinks: &StreamSinks,
        tap: Option<&Sender<Token>>,
    ) -> Result<GenerationResult, OllamaError> {
        let outcome = self
            .stream_records::<_, GenerateResponse>("/api/generate", &request, sinks, tap)
            .await
            .map(Assembled::into_generation_result);
        match &outcome {
            Ok(result) => {
                self.notifier
                    .notify_done(true, Some(result.response.clone()))
                    .await;
            }
            Err(e) => {
                self.notifier.notify_done(false, Some(e.to_string())).await;
            }
        }
        outcome
    }

    /// Runs the prompt as a one-message chat with the request's and the
    /// registered tools, resolving tool calls before answering.
    pub async fn generate_using_tools(
        &self,
        request: GenerateRequest,
        sinks: StreamSinks,
    ) -> Result<GenerationResult, OllamaError> {
        let streaming = sinks.thinking.is_some() || sinks.response.is_some();
        let GenerateRequest {
            mut base,
            prompt,
            system,
            images,
            tools,
            ..
        } = request;
        base.stream = Some(streaming);

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        let mut user = Message::user(prompt);
        user.images = images;
        messages.push(user);

        let mut chat = ChatRequest {
            base,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            use_tools: true,
        };
        self.resolve_chat(&mut chat, &sinks)
            .await
            .map(|result| result.generation)
    }

    /// Non-streaming chat, resolving tool calls when `use_tools` is set.
    pub async fn chat(&self, mut request: ChatRequest) -> Result<ChatResult, OllamaError> {
        request.base.stream = Some(false);
        self.resolve_chat(&mut request, &StreamSinks::default()).await
    }

    /// Streaming chat; every model call of the tool loop feeds `sinks`.
    pub async fn chat_with_sinks(
        &self,
        mut request: ChatRequest,
        sinks: StreamSinks,
    ) -> Result<ChatResult, OllamaError> {
        request.base.stream = Some(true);
        self.resolve_chat(&mut request, &sinks).await
    }

    /// Chat on a caller-owned request. Messages appended before a failure
    /// remain in `request.messages`.
    pub async fn resolve_chat(
        &self,
        request: &mut ChatRequest,
        sinks: &StreamSinks,
    ) -> Result<ChatResult, OllamaError> {
        let outcome = ToolCallResolver::new(self, &self.registry, &self.notifier)
            .max_rounds(self.max_tool_rounds)
            .resolve(request, sinks)
            .await;
        match &outcome {
            Ok(result) => {
                self.notifier
                    .notify_done(true, Some(result.message.content.clone()))
                    .await;
            }
            Err(e) => {
                self.notifier.notify_done(false, Some(e.to_string())).await;
            }
        }
        outcome
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns false if a tool with the same name was already registered.
    pub fn register_tool(&self, tool: Tool) -> bool {
        self.registry.register(tool)
    }

    pub fn register_tools<I: IntoIterator<Item = Tool>>(&self, tools: I) -> usize {
        self.registry.register_all(tools)
    }

    pub fn registered_tools(&self) -> Vec<Tool> {
        self.registry.snapshot()
    }

    pub fn deregister_tools(&self) {
        self.registry.clear();
    }

    /// Connects to an MCP server and registers every tool it lists.
    #[instrument(skip(self))]
    pub async fn register_mcp_server(&self, server: McpServerType) -> Result<usize, OllamaError> {
        let tools = get_mcp_tools(server, self.notification_sender()).await?;
        Ok(self.registry.register_all(tools))
    }

    /// Registers the tools of every server in an `mcpServers` config.
    pub async fn register_mcp_config(&self, config: &McpConfig) -> Result<usize, OllamaError> {
        let mut added = 0;
        for (name, server) in config.servers() {
            info!(server = %name, "connecting to MCP server");
            added += self.register_mcp_server(server).await?;
        }
        Ok(added)
    }
}

impl ChatBackend for OllamaClient {
    fn send_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        sinks: &'a StreamSinks,
    ) -> BoxFuture<'a, Result<ChatReply, OllamaError>> {
        Box::pin(async move {
            let assembled = self
                .stream_records::<_, ChatResponse>("/api/chat", request, sinks, None)
                .await?;
            let (message, generation) = assembled.into_reply();
            Ok(ChatReply { message, generation })
        })
    }
}

/// Requests that say whether the server should stream.
pub(crate) trait HasStreamFlag {
    fn is_streaming(&self) -> bool;
}

impl HasStreamFlag for GenerateRequest {
    fn is_streaming(&self) -> bool {
        self.base.stream == Some(true)
    }
}

impl HasStreamFlag for ChatRequest {
    fn is_streaming(&self) -> bool {
        self.base.stream == Some(true)
    }
}

/// Output of `fut`, or `None` if `idle` passes first.
async fn within<F: Future>(idle: Option<Duration>, fut: F) -> Option<F::Output> {
    match idle {
        Some(idle) => tokio::time::timeout(idle, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Next item of `lines`, or `None` if `idle` passes first.
async fn next_within<S>(lines: &mut S, idle: Option<Duration>) -> Option<Option<S::Item>>
where
    S: Stream + Unpin,
{
    within(idle, lines.next()).await
}

impl fmt::Display for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}
