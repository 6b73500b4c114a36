//! LLM integration for patch synthesis.

pub mod client;
pub mod error;
pub mod types;

pub use client::{strip_code_fences, LlmClient, RetryPolicy};
pub use error::LlmApiError;
