pub mod assembler;
pub mod cancel;
pub mod resolver;
pub mod result;
pub mod sinks;
pub mod streamer;

pub use assembler::{Assembled, AssemblerState, Fragment, Step, StreamAssembler, StreamRecord};
pub use cancel::CancelToken;
pub use resolver::{format_tool_result, ChatBackend, ChatReply, ToolCallResolver};
pub use result::{ChatResult, GenerationResult};
pub use sinks::{StreamSinks, TokenSink};
pub use streamer::GenerationStreamer;
