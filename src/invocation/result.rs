use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{Message, OllamaError, Timings};

/// Final outcome of one generate call, or of the last model call of a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub response: String,
    pub thinking: Option<String>,
    pub http_status: u16,
    pub elapsed: Duration,
    pub done: bool,
    pub model: String,
    pub created_at: String,
    pub done_reason: Option<String>,
    /// Conversation state for a follow-up generate call.
    pub context: Option<Vec<i64>>,
    pub timings: Timings,
}

impl GenerationResult {
    /// Decodes the response text as JSON, as produced with a `format` schema.
    pub fn structured<T: DeserializeOwned>(&self) -> Result<T, OllamaError> {
        let text = strip_code_fence(self.response.trim());
        serde_json::from_str(text).map_err(|e| {
            OllamaError::Decode(format!("response is not the requested JSON shape: {e}"))
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}

/// Outcome of a chat call, tool rounds included.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// The model's last reply.
    pub message: Message,
    /// The conversation as sent plus every assistant and tool message added.
    pub history: Vec<Message>,
    pub generation: GenerationResult,
    pub tool_rounds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct City {
        name: String,
        population: u64,
    }

    fn result(response: &str) -> GenerationResult {
        GenerationResult {
            response: response.to_string(),
            thinking: None,
            http_status: 200,
            elapsed: Duration::ZERO,
            done: true,
            model: "m".into(),
            created_at: String::new(),
            done_reason: None,
            context: None,
            timings: Timings::default(),
        }
    }

    #[test]
    fn structured_reads_plain_and_fenced_json() {
        let plain = result(r#" {"name": "Oslo", "population": 700000} "#);
        let fenced = result("```json\n{\"name\": \"Oslo\", \"population\": 700000}\n```");
        let expected = City {
            name: "Oslo".into(),
            population: 700000,
        };
        assert_eq!(plain.structured::<City>().unwrap(), expected);
        assert_eq!(fenced.structured::<City>().unwrap(), expected);
    }

    #[test]
    fn structured_rejects_prose() {
        let err = result("Oslo has 700k people").structured::<City>().unwrap_err();
        assert!(matches!(err, OllamaError::Decode(_)));
    }
}
