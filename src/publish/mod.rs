//! Publish pipeline
//!
//! Materializes a draft course aggregate into the live store and takes it
//! back out again:
//!
//! 1. **Remap**: transient draft-to-live id maps for one publish call
//! 2. **Cloner**: per-kind copy routines, parents before children
//! 3. **Orchestrator**: validation, live course resolution, transaction
//! 4. **Unpublish**: status-only reversal that keeps live rows intact

pub mod cloner;
pub mod orchestrator;
pub mod remap;
pub mod types;
pub mod unpublish;

#[cfg(test)]
mod tests;

pub use orchestrator::PublishOrchestrator;
pub use types::{CloneCounts, PublishError, PublishOutcome, UnpublishOutcome};
