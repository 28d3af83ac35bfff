//! Frame → PNG

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};

use super::{CaptureError, Frame, StreamConfig};

/// Encode `frame` as PNG, scaled to fit the configured size when one is set.
pub fn encode_png(frame: Frame, config: &StreamConfig) -> Result<Vec<u8>, CaptureError> {
    let Frame { width, height, rgba } = frame;
    let Some(pixels) = RgbaImage::from_raw(width, height, rgba) else {
        return Err(CaptureError::Encode(format!(
            "pixel buffer does not match {}x{}",
            width, height
        )));
    };
    let mut img = DynamicImage::ImageRgba8(pixels);

    if config.scales_to_fit {
        if let (Some(w), Some(h)) = (config.width, config.height) {
            if w > 0 && h > 0 && (w, h) != (width, height) {
                img = img.resize(w, h, FilterType::Triangle);
            }
        }
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    tracing::debug!("Frame encoded to PNG ({} bytes)", png.len());
    Ok(png)
}
