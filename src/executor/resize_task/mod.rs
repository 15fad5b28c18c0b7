//! Album resize engine.
//!
//! - [`orchestration`] - Context and the per-image resize loop

mod orchestration;


pub(crate) use orchestration::{ResizeTaskContext, output_path_for, run_resize_task};
