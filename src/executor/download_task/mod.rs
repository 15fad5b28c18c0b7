//! Album download engine.
//!
//! Split into focused submodules:
//! - [`context`] - Shared per-task state and per-asset outcomes
//! - [`orchestration`] - Top-level download lifecycle
//! - [`sync_plan`] - Remote vs local reconciliation
//! - [`chunk_processor`] - Chunked, bounded-concurrency fetching into the archive
//! - [`finalization`] - Archive completion, album records and cleanup

mod chunk_processor;
mod context;
mod finalization;
mod orchestration;
mod sync_plan;


pub(crate) use context::DownloadTaskContext;
pub(crate) use orchestration::{archive_path_for, run_download_task};
