//! Application layer: orchestration of the fix-and-verify lifecycle.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
