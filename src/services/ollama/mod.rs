pub mod client;
pub mod client_config;
pub(crate) mod lines;
pub mod models;

pub use client::OllamaClient;
pub use client_config::{Auth, ClientBuilder, ClientConfig};
