use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format and size details of a local model.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ModelMeta {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// Entry of `/api/tags`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: ModelMeta,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
}

/// Entry of `/api/ps`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunningModel {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelMeta,
    #[serde(default)]
    pub expires_at: String,
    #[serde(default)]
    pub size_vram: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct RunningModelsResponse {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct ShowModelRequest<'a> {
    pub model: &'a str,
}

/// Response from `/api/show`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ModelDetail {
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub modelfile: String,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub details: ModelMeta,
    #[serde(default)]
    pub model_info: Option<Value>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct PullRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
}

/// One status line streamed by `/api/pull`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PullStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct VersionResponse {
    pub version: String,
}

/// Error body the server returns on failed calls.
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: String,
}
