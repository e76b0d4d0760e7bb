use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ToolCall;

/// Represents the role of a message sender in a chat.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Raw image bytes, sent to the server as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(pub Vec<u8>);

impl ImageData {
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded.trim()).map(ImageData)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        ImageData(bytes)
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        ImageData::from_base64(&encoded).map_err(de::Error::custom)
    }
}

/// One entry of a conversation.
///
/// `id` is local bookkeeping and never sent over the wire.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    #[serde(default = "new_uuid", skip_serializing)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_uuid(),
            role,
            content: content.into(),
            thinking: None,
            tool_calls: None,
            images: None,
            tool_name: None,
        }
    }

    pub fn system<T: Into<String>>(content: T) -> Self {
        Self::new(Role::System, content)
    }
    pub fn user<T: Into<String>>(content: T) -> Self {
        Self::new(Role::User, content)
    }
    pub fn assistant<T: Into<String>>(content: T) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tool-result message attributed to `tool_name`.
    pub fn tool<T, S>(content: T, tool_name: S) -> Self
    where
        T: Into<String>,
        S: Into<String>,
    {
        let mut message = Self::new(Role::Tool, content);
        message.tool_name = Some(tool_name.into());
        message
    }

    pub fn with_images<I>(mut self, images: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ImageData>,
    {
        self.images = Some(images.into_iter().map(Into::into).collect());
        self
    }

    /// True when the message carries at least one tool call.
    pub fn requests_tools(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// The `think` request field: a boolean switch or a reasoning effort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkMode {
    Disabled,
    Enabled,
    Low,
    Medium,
    High,
}

impl ThinkMode {
    fn as_level(&self) -> Option<&'static str> {
        match self {
            ThinkMode::Low => Some("low"),
            ThinkMode::Medium => Some("medium"),
            ThinkMode::High => Some("high"),
            ThinkMode::Disabled | ThinkMode::Enabled => None,
        }
    }
}

impl From<bool> for ThinkMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            ThinkMode::Enabled
        } else {
            ThinkMode::Disabled
        }
    }
}

impl Serialize for ThinkMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self, self.as_level()) {
            (_, Some(level)) => serializer.serialize_str(level),
            (ThinkMode::Enabled, None) => serializer.serialize_bool(true),
            _ => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for ThinkMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ThinkVisitor;

        impl de::Visitor<'_> for ThinkVisitor {
            type Value = ThinkMode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or one of \"low\", \"medium\", \"high\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<ThinkMode, E> {
                Ok(ThinkMode::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ThinkMode, E> {
                match v {
                    "low" => Ok(ThinkMode::Low),
                    "medium" => Ok(ThinkMode::Medium),
                    "high" => Ok(ThinkMode::High),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(ThinkVisitor)
    }
}

/// Fields shared by the generate and chat requests.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BaseRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<InferenceOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<ThinkMode>,
}

impl BaseRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Model options sent in the `options` object.
///
/// Anything not covered by a typed field goes into `custom` and is
/// flattened next to the typed ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InferenceOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(flatten, default)]
    pub custom: Map<String, Value>,
}

impl InferenceOptions {
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Counters the server attaches to the terminal record of a response.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Timings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}
