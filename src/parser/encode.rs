//! Image encoding: `DynamicImage` → base64 PNG wrapped in [`ImageData`].
//!
//! PNG is chosen over JPEG because it is lossless — text crispness matters
//! far more than payload size for transcription accuracy.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use tracing::debug;

use crate::error::ExplainError;
use crate::llm::ImageData;

/// Encode a rasterised page as a base64 PNG ready for a multimodal message.
///
/// An empty render is logged but not fatal — the model call still proceeds
/// and reports whatever it sees.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, ExplainError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ExplainError::ImageEncodingFailed {
            detail: e.to_string(),
        })?;

    if buf.is_empty() {
        debug!("rendered page produced an empty image");
    }

    let b64 = STANDARD.encode(&buf);
    debug!("encoded page image: {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
