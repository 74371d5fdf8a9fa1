//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so the Tokio workers never stall during CPU-heavy rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: a poster-sized page at a fixed DPI would produce
//! a five-figure-pixel image. Capping the longest edge keeps memory bounded
//! regardless of physical page size and matches the image-size sweet spot
//! for vision models.

use image::DynamicImage;
use pdfium_render::prelude::*;

use crate::error::ExplainError;

/// Rasterise every page of the PDF into an image, in page order.
pub async fn rasterise_pages(
    pdf_bytes: Vec<u8>,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, ExplainError> {
    tokio::task::spawn_blocking(move || rasterise_blocking(&pdf_bytes, max_pixels))
        .await
        .map_err(|e| ExplainError::Internal(format!("render task panicked: {e}")))?
}

fn rasterise_blocking(
    pdf_bytes: &[u8],
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, ExplainError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| ExplainError::CorruptPdf {
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExplainError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ExplainError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

        images.push(bitmap.as_image());
    }

    Ok(images)
}
