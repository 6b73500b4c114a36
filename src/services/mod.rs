//! Service layer: business logic coordination.

pub mod broadcaster;
pub mod classifier;
pub mod patcher;
pub mod preparer;
pub mod registry;

pub use broadcaster::{SnapshotBroadcaster, StreamEvent};
pub use patcher::{HeuristicFixStrategy, LlmPatchStrategy, PatchPipeline};
pub use preparer::{derive_branch_name, is_valid_fix_branch_name, RepoPreparer};
pub use registry::JobRegistry;
