//! Download task execution: the per-task pipeline.
//!
//! Split into focused submodules:
//! - [`context`] - Pipeline dependencies and per-execution transfer state
//! - [`orchestration`] - Phase sequencing from fetch to commit
//! - [`transfer`] - Streaming under the stall watchdog
//! - [`finalization`] - Atomic commit, success and failure handling

mod context;
mod finalization;
mod orchestration;
mod transfer;


pub(crate) use context::DownloadPipeline;
