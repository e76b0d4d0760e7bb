pub mod base;
pub mod chat;
pub mod embedding;
pub mod errors;
pub mod generate;
pub mod model;
pub mod structured_output;

pub use base::*;
pub use chat::{ChatRequest, ChatResponse};
pub use embedding::{EmbedRequest, EmbedResponse};
pub use errors::*;
pub use generate::{GenerateRequest, GenerateResponse};
pub use model::{ErrorResponse, Model, ModelDetail, ModelMeta, PullStatus, RunningModel};
pub use structured_output::SchemaSpec;
