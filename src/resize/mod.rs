//! Image resizing behind a pluggable trait
//!
//! The resize engine only depends on [`ImageResizer`]. [`ImageCrateResizer`] is the
//! default implementation, backed by the `image` crate.

mod image_crate;
mod traits;

pub use image_crate::ImageCrateResizer;
pub use traits::{ImageResizer, ResizeOutcome, ResizeTarget, fit_within};
