//! Image fitting: source bytes → re-encoded image inside a bounding box.
//!
//! The source format is never embedded as-is. Every accepted image is
//! decoded and re-encoded as PNG, the one format every office serializer
//! embeds without surprises. Scaling preserves aspect ratio and only
//! shrinks relative to the nominal target width:
//!
//! ```text
//! height = round(h0 * target_width / w0)
//! if height > max_height:
//!     scale = max_height / height
//!     width, height = width * scale, height * scale
//! round last
//! ```

use crate::config::FitBounds;
use crate::error::ImageFitError;
use crate::model::{FittedImage, ImageKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Output dimensions for a `w0`×`h0` source.
///
/// Both results are at least 1 and at most `max_width`/`max_height`.
pub fn fit_dimensions(w0: u32, h0: u32, bounds: &FitBounds) -> (u32, u32) {
    let target_width = bounds.target_width.min(bounds.max_width).max(1) as f64;
    let max_height = bounds.max_height.max(1) as f64;

    let mut width = target_width;
    let mut height = (h0 as f64 * target_width / w0.max(1) as f64).round();
    if height > max_height {
        let scale = max_height / height;
        width *= scale;
        height *= scale;
    }

    let width = (width.round() as u32).clamp(1, bounds.max_width.max(1));
    let height = (height.round() as u32).clamp(1, bounds.max_height.max(1));
    (width, height)
}

/// Map a sniffed format onto the supported set.
pub fn detect_format(bytes: &[u8]) -> Result<ImageKind, ImageFitError> {
    let format = image::guess_format(bytes).map_err(|e| ImageFitError::UnsupportedFormat {
        detail: e.to_string(),
    })?;
    match format {
        ImageFormat::Png => Ok(ImageKind::Png),
        ImageFormat::Jpeg => Ok(ImageKind::Jpeg),
        ImageFormat::Gif => Ok(ImageKind::Gif),
        ImageFormat::WebP => Ok(ImageKind::Webp),
        other => Err(ImageFitError::UnsupportedFormat {
            detail: format!("{other:?}"),
        }),
    }
}

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Gif => ImageFormat::Gif,
        ImageKind::Webp => ImageFormat::WebP,
    }
}

/// Validate, decode, scale and re-encode `bytes`.
///
/// Source dimensions come from the header alone, so an oversized image is
/// rejected before any pixel buffer is allocated.
pub fn fit_image(bytes: &[u8], bounds: &FitBounds) -> Result<FittedImage, ImageFitError> {
    let source_format = detect_format(bytes)?;
    let reader = || ImageReader::with_format(Cursor::new(bytes), image_format(source_format));

    let (w0, h0) = reader()
        .into_dimensions()
        .map_err(|e| ImageFitError::DecodeError(e.to_string()))?;
    if w0 < bounds.min_source_dimension || h0 < bounds.min_source_dimension {
        return Err(ImageFitError::ImageTooSmall {
            width: w0,
            height: h0,
            min: bounds.min_source_dimension,
        });
    }
    if w0 > bounds.max_source_dimension || h0 > bounds.max_source_dimension {
        return Err(ImageFitError::ImageTooLarge {
            width: w0,
            height: h0,
            max: bounds.max_source_dimension,
        });
    }

    let img = reader()
        .decode()
        .map_err(|e| ImageFitError::DecodeError(e.to_string()))?;

    let (width, height) = fit_dimensions(w0, h0, bounds);
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);
    let bytes = encode_png(&resized)?;

    debug!(
        "Fitted {:?} {}x{} → png {}x{} ({} bytes)",
        source_format,
        w0,
        h0,
        width,
        height,
        bytes.len()
    );

    Ok(FittedImage {
        bytes,
        width,
        height,
        format: ImageKind::Png,
        source_format,
    })
}

/// [`fit_image`] for a `data:<mime>;base64,<payload>` URI.
pub fn fit_data_uri(uri: &str, bounds: &FitBounds) -> Result<FittedImage, ImageFitError> {
    fit_image(&decode_data_uri(uri)?, bounds)
}

/// Extract the payload of a base64 data URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ImageFitError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| ImageFitError::InvalidDataUri("missing 'data:' prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageFitError::InvalidDataUri("missing ',' separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(ImageFitError::InvalidDataUri(
            "only base64 data URIs are supported".into(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageFitError::InvalidDataUri(e.to_string()))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImageFitError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImageFitError::EncodeError(e.to_string()))?;
    Ok(buf)
}
