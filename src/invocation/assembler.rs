//! Incremental assembly of streamed generate/chat records.
//!
//! Every record, the terminal `done` record included, is treated the same:
//! its fragment is dispatched and appended to the accumulators. Concatenating
//! everything the response sink received therefore always yields exactly
//! [`GenerationResult::response`].

use std::time::Duration;

use crate::{
    services::ollama::models::errors::{error_line_text, server_error},
    ChatResponse, GenerateResponse, Message, OllamaError, PartialGeneration, Role,
    StreamFailureKind, Token, ToolCall,
};

use super::{result::GenerationResult, sinks::StreamSinks};

/// A decoded line of a streamed response body.
pub trait StreamRecord {
    fn thinking_fragment(&self) -> &str;
    fn response_fragment(&self) -> &str;
    fn is_done(&self) -> bool;
    fn tool_calls(&self) -> &[ToolCall];
}

impl StreamRecord for GenerateResponse {
    fn thinking_fragment(&self) -> &str {
        self.thinking.as_deref().unwrap_or_default()
    }
    fn response_fragment(&self) -> &str {
        &self.response
    }
    fn is_done(&self) -> bool {
        self.done
    }
    fn tool_calls(&self) -> &[ToolCall] {
        &[]
    }
}

impl StreamRecord for ChatResponse {
    fn thinking_fragment(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|m| m.thinking.as_deref())
            .unwrap_or_default()
    }
    fn response_fragment(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or_default()
    }
    fn is_done(&self) -> bool {
        self.done
    }
    fn tool_calls(&self) -> &[ToolCall] {
        self.message
            .as_ref()
            .and_then(|m| m.tool_calls.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Pending,
    Streaming,
    Done,
    Failed,
}

impl AssemblerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssemblerState::Done | AssemblerState::Failed)
    }
}

/// The fragment a record contributed to the sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Thinking(String),
    Response(String),
}

impl Fragment {
    pub fn into_token(self) -> Token {
        match self {
            Fragment::Thinking(text) => Token::thinking(text),
            Fragment::Response(text) => Token::response(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    pub fragment: Option<Fragment>,
    /// No further records will be consumed.
    pub done: bool,
}

/// A completed stream.
#[derive(Debug, Clone)]
pub struct Assembled<R> {
    pub response: String,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub terminal: R,
    pub http_status: u16,
    pub elapsed: Duration,
}

pub struct StreamAssembler<R> {
    sinks: StreamSinks,
    state: AssemblerState,
    response: String,
    thinking: String,
    tool_calls: Vec<ToolCall>,
    error_text: Vec<String>,
    terminal: Option<R>,
}

impl<R: StreamRecord> StreamAssembler<R> {
    pub fn new(sinks: StreamSinks) -> Self {
        Self {
            sinks,
            state: AssemblerState::Pending,
            response: String::new(),
            thinking: String::new(),
            tool_calls: Vec::new(),
            error_text: Vec::new(),
            terminal: None,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn response_text(&self) -> &str {
        &self.response
    }

    /// Consumes one record. Records after a terminal state are ignored.
    pub fn push(&mut self, record: R) -> Step {
        if self.state.is_terminal() {
            return Step {
                fragment: None,
                done: true,
            };
        }
        self.state = AssemblerState::Streaming;

        let thinking = record.thinking_fragment();
        let response = record.response_fragment();

        let fragment = if !thinking.is_empty() && response.is_empty() {
            self.sinks.emit_thinking(thinking);
            self.thinking.push_str(thinking);
            Some(Fragment::Thinking(thinking.to_string()))
        } else if !response.is_empty() {
            // Both present: thinking is kept but only the response is dispatched.
            self.thinking.push_str(thinking);
            self.sinks.emit_response(response);
            self.response.push_str(response);
            Some(Fragment::Response(response.to_string()))
        } else {
            None
        };

        self.tool_calls.extend_from_slice(record.tool_calls());

        let done = record.is_done();
        if done {
            self.terminal = Some(record);
            self.state = AssemblerState::Done;
        }
        Step { fragment, done }
    }

    /// Consumes one line of a non-success response body.
    pub fn push_error_line(&mut self, line: &[u8]) {
        if self.state.is_terminal() {
            return;
        }
        self.state = AssemblerState::Streaming;
        let Some(text) = error_line_text(line) else {
            return;
        };
        if !self.response.is_empty() {
            self.response.push('\n');
        }
        self.response.push_str(&text);
        self.error_text.push(text);
    }

    /// Marks the stream failed and returns the error with the partial text.
    pub fn fail(&mut self, kind: StreamFailureKind, message: impl Into<String>) -> OllamaError {
        self.state = AssemblerState::Failed;
        OllamaError::stream(kind, message, self.partial())
    }

    pub fn partial(&self) -> PartialGeneration {
        PartialGeneration {
            response: self.response.clone(),
            thinking: non_empty(&self.thinking),
        }
    }

    /// Closes the stream once the body is exhausted.
    pub fn finish(mut self, http_status: u16, elapsed: Duration) -> Result<Assembled<R>, OllamaError> {
        if !(200..300).contains(&http_status) {
            return Err(server_error(http_status, &self.error_text));
        }

        match self.terminal.take() {
            Some(terminal) if self.state == AssemblerState::Done => Ok(Assembled {
                thinking: non_empty(&self.thinking),
                response: self.response,
                tool_calls: self.tool_calls,
                terminal,
                http_status,
                elapsed,
            }),
            _ => Err(self.fail(
                StreamFailureKind::Incomplete,
                "response body ended before the final record",
            )),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

impl Assembled<GenerateResponse> {
    pub fn into_generation_result(self) -> GenerationResult {
        let GenerateResponse {
            model,
            created_at,
            done,
            done_reason,
            context,
            timings,
            ..
        } = self.terminal;
        GenerationResult {
            response: self.response,
            thinking: self.thinking,
            http_status: self.http_status,
            elapsed: self.elapsed,
            done,
            model,
            created_at,
            done_reason,
            context,
            timings,
        }
    }
}

impl Assembled<ChatResponse> {
    /// The assistant message rebuilt from the accumulated fragments, and the
    /// call's result.
    pub fn into_reply(self) -> (Message, GenerationResult) {
        let ChatResponse {
            model,
            created_at,
            message,
            done,
            done_reason,
            timings,
        } = self.terminal;

        let mut reply = message.unwrap_or_else(|| Message::new(Role::Assistant, ""));
        reply.content = self.response.clone();
        reply.thinking = self.thinking.clone();
        reply.tool_calls = (!self.tool_calls.is_empty()).then_some(self.tool_calls);

        let generation = GenerationResult {
            response: self.response,
            thinking: self.thinking,
            http_status: self.http_status,
            elapsed: self.elapsed,
            done,
            model,
            created_at,
            done_reason,
            context: None,
            timings,
        };
        (reply, generation)
    }
}

/// Terminal counters of an assembled chat, for notifications.
pub(crate) fn chat_response_of(reply: &Message, generation: &GenerationResult) -> ChatResponse {
    ChatResponse {
        model: generation.model.clone(),
        created_at: generation.created_at.clone(),
        message: Some(reply.clone()),
        done: generation.done,
        done_reason: generation.done_reason.clone(),
        timings: generation.timings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn generate_record(response: &str, thinking: Option<&str>, done: bool) -> GenerateResponse {
        GenerateResponse {
            model: "m".into(),
            response: response.into(),
            thinking: thinking.map(String::from),
            done,
            ..Default::default()
        }
    }

    fn chat(content: &str, done: bool) -> ChatResponse {
        serde_json::from_value(json!({
            "model": "m",
            "message": {"role": "assistant", "content": content},
            "done": done
        }))
        .unwrap()
    }

    fn recording_sinks() -> (StreamSinks, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let thinking = Arc::new(Mutex::new(Vec::new()));
        let response = Arc::new(Mutex::new(Vec::new()));
        let (t, r) = (Arc::clone(&thinking), Arc::clone(&response));
        let sinks = StreamSinks::new()
            .on_thinking(move |f| t.lock().unwrap().push(f.to_string()))
            .on_response(move |f| r.lock().unwrap().push(f.to_string()));
        (sinks, thinking, response)
    }

    #[test]
    fn response_sink_concatenation_equals_final_text() {
        let (sinks, _, seen) = recording_sinks();
        let mut asm = StreamAssembler::new(sinks);
        for rec in [generate_record("The ", None, false), generate_record("sky ", None, false), generate_record("is blue", None, true)] {
            asm.push(rec);
        }
        let result = asm
            .finish(200, Duration::from_millis(5))
            .unwrap()
            .into_generation_result();
        assert_eq!(seen.lock().unwrap().concat(), result.response);
        assert_eq!(result.response, "The sky is blue");
        assert!(result.done);
    }

    #[test]
    fn result_without_sinks_matches_result_with_sinks() {
        let records = || vec![generate_record("", Some("hmm"), false), generate_record("4", None, false), generate_record("2", None, true)];

        let mut bare = StreamAssembler::new(StreamSinks::default());
        records().into_iter().for_each(|r| {
            bare.push(r);
        });
        let bare = bare.finish(200, Duration::ZERO).unwrap().into_generation_result();

        let (sinks, thinking, response) = recording_sinks();
        let mut tapped = StreamAssembler::new(sinks);
        records().into_iter().for_each(|r| {
            tapped.push(r);
        });
        let tapped = tapped.finish(200, Duration::ZERO).unwrap().into_generation_result();

        assert_eq!(bare.response, tapped.response);
        assert_eq!(bare.thinking.as_deref(), Some("hmm"));
        assert_eq!(response.lock().unwrap().concat(), bare.response);
        assert_eq!(*thinking.lock().unwrap(), vec!["hmm".to_string()]);
    }

    #[test]
    fn terminal_fragment_is_included_for_chat_too() {
        let (sinks, _, seen) = recording_sinks();
        let mut asm = StreamAssembler::new(sinks);
        asm.push(chat("Hel", false));
        let step = asm.push(chat("lo", true));
        assert!(step.done);
        assert_eq!(step.fragment, Some(Fragment::Response("lo".into())));
        let (reply, generation) = asm.finish(200, Duration::ZERO).unwrap().into_reply();
        assert_eq!(reply.content, "Hello");
        assert_eq!(generation.response, "Hello");
        assert_eq!(seen.lock().unwrap().concat(), "Hello");
    }

    #[test]
    fn mixed_record_dispatches_response_only() {
        let (sinks, thinking, response) = recording_sinks();
        let mut asm = StreamAssembler::new(sinks);
        let step = asm.push(generate_record("answer", Some("reason"), true));
        assert_eq!(step.fragment, Some(Fragment::Response("answer".into())));
        assert!(thinking.lock().unwrap().is_empty());
        assert_eq!(*response.lock().unwrap(), vec!["answer".to_string()]);
        let result = asm.finish(200, Duration::ZERO).unwrap().into_generation_result();
        assert_eq!(result.thinking.as_deref(), Some("reason"));
    }

    #[test]
    fn records_after_done_are_ignored() {
        let mut asm = StreamAssembler::new(StreamSinks::default());
        asm.push(generate_record("final", None, true));
        let step = asm.push(generate_record(" extra", None, false));
        assert_eq!(step.fragment, None);
        assert_eq!(asm.state(), AssemblerState::Done);
        let result = asm.finish(200, Duration::ZERO).unwrap().into_generation_result();
        assert_eq!(result.response, "final");
    }

    #[test]
    fn missing_done_record_keeps_partial_text() {
        let mut asm = StreamAssembler::new(StreamSinks::default());
        asm.push(generate_record("half an ans", None, false));
        let err = asm.finish(200, Duration::ZERO).unwrap_err();
        match err {
            OllamaError::Stream(failure) => {
                assert_eq!(failure.kind, StreamFailureKind::Incomplete);
                assert_eq!(failure.partial.response, "half an ans");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_success_body_becomes_server_error() {
        let mut asm: StreamAssembler<GenerateResponse> = StreamAssembler::new(StreamSinks::default());
        asm.push_error_line(br#"{"error":"model 'nope' not found"}"#);
        assert_eq!(asm.response_text(), "model 'nope' not found");
        let err = asm.finish(404, Duration::ZERO).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "server returned 404: model 'nope' not found");
    }

    #[test]
    fn any_2xx_status_is_success() {
        let mut asm = StreamAssembler::new(StreamSinks::default());
        asm.push(generate_record("created", None, true));
        let result = asm.finish(201, Duration::ZERO).unwrap();
        assert_eq!(result.http_status, 201);
        assert_eq!(result.into_generation_result().response, "created");

        let mut asm = StreamAssembler::new(StreamSinks::default());
        asm.push(generate_record("ignored", None, true));
        let err = asm.finish(500, Duration::ZERO).unwrap_err();
        assert!(matches!(err, OllamaError::Server { status: 500, .. }));
    }

    #[test]
    fn empty_unauthorized_body_is_named() {
        let asm: StreamAssembler<ChatResponse> = StreamAssembler::new(StreamSinks::default());
        let err = asm.finish(401, Duration::ZERO).unwrap_err();
        assert!(matches!(err, OllamaError::Server { status: 401, ref message } if message == "Unauthorized"));
    }

    #[test]
    fn tool_calls_accumulate_across_chunks() {
        let mut asm = StreamAssembler::new(StreamSinks::default());
        let with_call = |name: &str, done: bool| -> ChatResponse {
            serde_json::from_value(json!({
                "model": "m",
                "message": {"role": "assistant", "content": "",
                    "tool_calls": [{"function": {"name": name, "arguments": {}}}]},
                "done": done
            }))
            .unwrap()
        };
        asm.push(with_call("first", false));
        asm.push(with_call("second", true));
        let (reply, _) = asm.finish(200, Duration::ZERO).unwrap().into_reply();
        let names: Vec<_> = reply
            .tool_calls
            .unwrap()
            .into_iter()
            .map(|c| c.function.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
