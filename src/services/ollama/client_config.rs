use std::{collections::HashMap, time::Duration};

use crate::OllamaError;

use super::client::OllamaClient;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 3;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Base delay before the first model pull retry; doubled on each further attempt.
pub const PULL_RETRY_BASE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub auth: Option<Auth>,
    pub extra_headers: Option<HashMap<String, String>>,
    pub connect_timeout: Option<Duration>,
    /// Longest silence tolerated between two chunks of a response body.
    pub read_timeout: Option<Duration>,
    /// Limit on a whole call, connect through the last byte.
    pub request_timeout: Option<Duration>,
    pub max_tool_rounds: Option<usize>,
    pub pull_retries: Option<u32>,
    /// Wait before the first pull retry; doubles after each attempt.
    pub pull_retry_delay: Option<Duration>,
    /// Name attached to notifications from this client.
    pub name: Option<String>,
}

impl ClientConfig {
    /// Reads `OLLAMA_HOST` and `OLLAMA_API_KEY`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|h| {
                if h.starts_with("http://") || h.starts_with("https://") {
                    h
                } else {
                    format!("http://{h}")
                }
            });
        let auth = std::env::var("OLLAMA_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(Auth::Bearer);
        Self {
            base_url,
            auth,
            ..Default::default()
        }
    }

    /// Base URL without trailing slashes.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_HOST)
            .trim_end_matches('/')
            .to_string()
    }
}

pub trait ClientBuilder {
    fn base_url(self, base_url: impl Into<String>) -> Self;
    fn api_key(self, api_key: impl Into<String>) -> Self;
    fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self;
    fn extra_headers(self, extra_headers: HashMap<String, String>) -> Self;
    fn connect_timeout(self, timeout: Duration) -> Self;
    fn read_timeout(self, timeout: Duration) -> Self;
    fn request_timeout(self, timeout: Duration) -> Self;
    fn max_tool_rounds(self, rounds: usize) -> Self;
    fn pull_retries(self, retries: u32) -> Self;
    fn pull_retry_delay(self, delay: Duration) -> Self;
    fn name(self, name: impl Into<String>) -> Self;
    fn build(self) -> Result<OllamaClient, OllamaError>;
}

impl ClientBuilder for ClientConfig {
    fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(api_key.into()));
        self
    }

    fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    fn extra_headers(mut self, extra_headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(extra_headers);
        self
    }

    fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    fn pull_retries(mut self, retries: u32) -> Self {
        self.pull_retries = Some(retries);
        self
    }

    fn pull_retry_delay(mut self, delay: Duration) -> Self {
        self.pull_retry_delay = Some(delay);
        self
    }

    fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn build(self) -> Result<OllamaClient, OllamaError> {
        OllamaClient::try_from(self)
    }
}
