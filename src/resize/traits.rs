//! Traits and types for image resizing

use crate::db::ResizeProfile;
use crate::error::Result;
use crate::types::Orientation;

/// What a resize run should produce for one image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeTarget {
    /// Maximum output width
    pub width: u32,
    /// Maximum output height
    pub height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Keep images wider than tall
    pub include_horizontal: bool,
    /// Keep images taller than (or as tall as) wide
    pub include_vertical: bool,
    /// Pad onto a black canvas of exactly `width` x `height`
    pub letterbox: bool,
}

impl ResizeTarget {
    /// Build a target from a stored profile
    pub fn from_profile(profile: &ResizeProfile, letterbox: bool) -> Self {
        Self {
            width: profile.width,
            height: profile.height,
            quality: profile.quality,
            include_horizontal: profile.include_horizontal,
            include_vertical: profile.include_vertical,
            letterbox,
        }
    }

    /// Whether images of `orientation` pass the profile filter
    pub fn accepts(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::Horizontal => self.include_horizontal,
            Orientation::Vertical => self.include_vertical,
        }
    }
}

/// Result of resizing one image
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Encoded JPEG bytes
    Resized(Vec<u8>),
    /// Filtered out by orientation
    Skipped(Orientation),
}

/// Pluggable resize capability
///
/// Implementations are CPU-bound and synchronous; the resize engine runs them on the
/// blocking thread pool.
pub trait ImageResizer: Send + Sync {
    /// Decode `bytes`, apply the orientation filter, resize and re-encode as JPEG
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`](crate::Error::Image) if the bytes cannot be decoded or
    /// the result cannot be encoded.
    fn resize(&self, bytes: &[u8], target: &ResizeTarget) -> Result<ResizeOutcome>;
}

/// Largest size with the source aspect ratio that fits inside `max_width` x `max_height`
///
/// Both dimensions are at least 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width.max(1), max_height.max(1));
    }

    let source_aspect = width as f64 / height as f64;
    let target_aspect = max_width as f64 / max_height.max(1) as f64;

    let (new_width, new_height) = if source_aspect > target_aspect {
        (max_width, (max_width as f64 / source_aspect) as u32)
    } else {
        ((max_height as f64 * source_aspect) as u32, max_height)
    };

    (new_width.max(1), new_height.max(1))
}
