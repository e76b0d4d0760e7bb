pub mod mcp;
pub mod ollama;
