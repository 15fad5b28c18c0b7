//! Default resizer backed by the `image` crate

use super::traits::{ImageResizer, ResizeOutcome, ResizeTarget, fit_within};
use crate::error::{Error, Result};
use crate::types::Orientation;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation as ExifOrientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Lanczos resize plus JPEG re-encode
///
/// Images are turned upright according to their EXIF orientation before the
/// orientation filter and the resize, so the output carries no rotation tag.
///
/// # Examples
///
/// ```no_run
/// use album_dl::resize::{ImageCrateResizer, ImageResizer, ResizeTarget};
///
/// # fn example(bytes: &[u8]) -> album_dl::Result<()> {
/// let target = ResizeTarget {
///     width: 1920,
///     height: 1080,
///     quality: 85,
///     include_horizontal: true,
///     include_vertical: true,
///     letterbox: false,
/// };
/// let outcome = ImageCrateResizer.resize(bytes, &target)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCrateResizer;

impl ImageResizer for ImageCrateResizer {
    fn resize(&self, bytes: &[u8], target: &ResizeTarget) -> Result<ResizeOutcome> {
        let img = decode_upright(bytes)?;

        let (width, height) = img.dimensions();
        let orientation = Orientation::of(width, height);
        if !target.accepts(orientation) {
            return Ok(ResizeOutcome::Skipped(orientation));
        }

        let (new_width, new_height) = fit_within(width, height, target.width, target.height);
        let resized = img
            .resize_exact(new_width, new_height, FilterType::Lanczos3)
            .to_rgb8();

        let output = if target.letterbox {
            let mut canvas = RgbImage::from_pixel(
                target.width.max(1),
                target.height.max(1),
                Rgb([0, 0, 0]),
            );
            let x = (canvas.width().saturating_sub(new_width) / 2) as i64;
            let y = (canvas.height().saturating_sub(new_height) / 2) as i64;
            imageops::overlay(&mut canvas, &resized, x, y);
            canvas
        } else {
            resized
        };

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, target.quality.clamp(1, 100))
            .encode_image(&output)
            .map_err(|e| Error::Image(format!("failed to encode JPEG: {}", e)))?;

        Ok(ResizeOutcome::Resized(encoded))
    }
}

/// Decode `bytes` and apply the EXIF orientation, if any
fn decode_upright(bytes: &[u8]) -> Result<DynamicImage> {
    let decode_failed = |e: &dyn std::fmt::Display| Error::Image(format!("failed to decode image: {}", e));

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_failed(&e))?
        .into_decoder()
        .map_err(|e| decode_failed(&e))?;
    // Unreadable metadata is treated as "no rotation"
    let orientation = decoder.orientation().unwrap_or(ExifOrientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_failed(&e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// JPEG of `width` x `height` stored pixels carrying an EXIF orientation tag
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([30, 200, 30]));
        let mut plain = Vec::new();
        JpegEncoder::new_with_quality(&mut plain, 90)
            .encode_image(&img)
            .unwrap();

        // Big-endian TIFF with a single IFD entry: Orientation (0x0112), SHORT, count 1
        let mut tiff = vec![b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, 0x00, 0x01];
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);
        let length = (app1.len() + 2) as u16;

        // SOI, then APP1, then the rest of the encoded stream
        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&plain[2..]);
        out
    }

    fn target(width: u32, height: u32) -> ResizeTarget {
        ResizeTarget {
            width,
            height,
            quality: 85,
            include_horizontal: true,
            include_vertical: true,
            letterbox: false,
        }
    }

    fn decoded_size(outcome: ResizeOutcome) -> (u32, u32) {
        match outcome {
            ResizeOutcome::Resized(bytes) => image::load_from_memory(&bytes).unwrap().dimensions(),
            other => panic!("expected resized output, got {other:?}"),
        }
    }

    #[test]
    fn output_fits_within_target_and_keeps_aspect() {
        let outcome = ImageCrateResizer.resize(&png(400, 200), &target(100, 100)).unwrap();
        assert_eq!(decoded_size(outcome), (100, 50));
    }

    #[test]
    fn letterbox_pads_to_exact_target_size() {
        let mut t = target(100, 100);
        t.letterbox = true;

        let outcome = ImageCrateResizer.resize(&png(400, 200), &t).unwrap();
        assert_eq!(decoded_size(outcome), (100, 100));
    }

    #[test]
    fn output_is_jpeg() {
        let outcome = ImageCrateResizer.resize(&png(50, 50), &target(20, 20)).unwrap();
        let ResizeOutcome::Resized(bytes) = outcome else {
            panic!("expected resized output");
        };
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn excluded_orientation_is_skipped() {
        let mut t = target(100, 100);
        t.include_vertical = false;

        let outcome = ImageCrateResizer.resize(&png(100, 300), &t).unwrap();
        assert_eq!(outcome, ResizeOutcome::Skipped(Orientation::Vertical));

        // Square images count as vertical
        let outcome = ImageCrateResizer.resize(&png(100, 100), &t).unwrap();
        assert_eq!(outcome, ResizeOutcome::Skipped(Orientation::Vertical));
    }

    #[test]
    fn exif_rotation_is_applied_before_the_orientation_filter() {
        // Stored sideways (wide), displayed upright (tall) after a 90 degree turn
        let sideways_portrait = jpeg_with_orientation(200, 100, 6);

        let mut landscape_only = target(100, 100);
        landscape_only.include_vertical = false;
        let outcome = ImageCrateResizer.resize(&sideways_portrait, &landscape_only).unwrap();
        assert_eq!(outcome, ResizeOutcome::Skipped(Orientation::Vertical));

        let outcome = ImageCrateResizer.resize(&sideways_portrait, &target(100, 100)).unwrap();
        assert_eq!(decoded_size(outcome), (50, 100));
    }

    #[test]
    fn jpeg_without_rotation_keeps_its_stored_orientation() {
        let outcome = ImageCrateResizer
            .resize(&jpeg_with_orientation(200, 100, 1), &target(100, 100))
            .unwrap();
        assert_eq!(decoded_size(outcome), (100, 50));
    }

    #[test]
    fn undecodable_bytes_are_an_image_error() {
        let err = ImageCrateResizer
            .resize(b"not an image", &target(10, 10))
            .unwrap_err();
        assert_eq!(err.error_code(), "image_error");
    }
}
