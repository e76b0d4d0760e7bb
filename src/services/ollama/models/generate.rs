use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::{BaseRequest, ImageData, InferenceOptions, ThinkMode, Timings};
use crate::Tool;

/// Request for the `/api/generate` endpoint.
#[derive(Serialize, Debug, Clone)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageData>>,
    /// Extra tools for `generate_using_tools`; the generate endpoint itself
    /// never sees them.
    #[serde(skip)]
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            base: BaseRequest::new(model),
            prompt: prompt.into(),
            system: None,
            template: None,
            context: None,
            raw: None,
            images: None,
            tools: Vec::new(),
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
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

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn context(mut self, context: Vec<i64>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn images<I>(mut self, images: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ImageData>,
    {
        self.images = Some(images.into_iter().map(Into::into).collect());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }
}

/// One record from the `/api/generate` endpoint.
///
/// Non-streaming calls return a single record with `done == true`. Streaming
/// calls return many; only the last one carries the counters and `context`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(flatten)]
    pub timings: Timings,
}
