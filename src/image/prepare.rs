use crate::error::ConfigError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Canvas + mask pair ready to attach to an image edit call.
///
/// Request-scoped: derived from caller-supplied bytes, never persisted.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Square RGBA canvas, PNG-encoded, with at least one fully transparent
    /// pixel so alpha-channel detection downstream always succeeds.
    pub canvas_png: Vec<u8>,
    /// Same-dimension fully transparent mask, PNG-encoded.
    pub mask_png: Vec<u8>,
    pub side_px: u32,
}

/// Normalize arbitrary raster bytes into the fixed square edit geometry.
///
/// Largest centered square crop, resampled to `target_px`², alpha channel
/// preserved or added. Both encoded artifacts are capped at `max_bytes`;
/// exceeding the ceiling is a hard failure with no re-compression retry.
pub fn prepare_source_image(
    bytes: &[u8],
    target_px: u32,
    max_bytes: usize,
) -> Result<PreparedImage, ConfigError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ConfigError::Validation(format!("source image is not decodable: {e}")))?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ConfigError::Validation(format!(
            "source image has invalid dimensions {width}x{height}"
        )));
    }

    let side = width.min(height);
    let cropped = decoded.crop_imm((width - side) / 2, (height - side) / 2, side, side);
    let mut canvas = cropped
        .resize_exact(target_px, target_px, FilterType::Lanczos3)
        .to_rgba8();
    ensure_transparent_pixel(&mut canvas);

    let canvas_png = encode_png(&canvas, max_bytes, "canvas")?;
    let mask = RgbaImage::from_pixel(target_px, target_px, Rgba([0, 0, 0, 0]));
    let mask_png = encode_png(&mask, max_bytes, "mask")?;

    Ok(PreparedImage {
        canvas_png,
        mask_png,
        side_px: target_px,
    })
}

/// Guarantee at least one fully transparent pixel. Sources without an alpha
/// channel decode fully opaque, so the top-left pixel is punched out.
fn ensure_transparent_pixel(canvas: &mut RgbaImage) {
    if canvas.pixels().any(|p| p.0[3] == 0) {
        return;
    }
    if let Some(pixel) = canvas.get_pixel_mut_checked(0, 0) {
        pixel.0[3] = 0;
    }
}

fn encode_png(
    canvas: &RgbaImage,
    max_bytes: usize,
    artifact: &str,
) -> Result<Vec<u8>, ConfigError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(canvas.clone())
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ConfigError::Validation(format!("failed to encode {artifact} PNG: {e}")))?;

    if buffer.len() > max_bytes {
        return Err(ConfigError::Validation(format!(
            "{artifact} PNG is {} bytes, above the {max_bytes}-byte ceiling",
            buffer.len()
        )));
    }
    Ok(buffer)
}
