mod agent;
mod agent_builder;
mod agent_spec;
mod error;

pub use agent::*;
pub use agent_builder::*;
pub use agent_spec::*;
pub use error::*;
