//! Domain layer: core models, error taxonomy, and ports.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{AgentError, AgentResult};
