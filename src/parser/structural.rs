//! Structural (non-LLM) text extraction via pdfium.
//!
//! Pages are extracted one at a time rather than as a single document pass:
//! per-page isolation bounds the blast radius of a bad page to that page's
//! error, and keeps the extraction cost proportional to what the request
//! actually needs.

use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::ExplainError;

/// Layout-aware extraction straight from the PDF's text layer.
#[derive(Default)]
pub struct StructuralParser;

impl StructuralParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract every page's text, concatenated in page order.
    pub async fn produce_text(&self, pdf_bytes: &[u8]) -> Result<String, ExplainError> {
        let bytes = pdf_bytes.to_vec();
        tokio::task::spawn_blocking(move || extract_blocking(&bytes))
            .await
            .map_err(|e| ExplainError::Internal(format!("extraction task panicked: {e}")))?
    }
}

fn extract_blocking(pdf_bytes: &[u8]) -> Result<String, ExplainError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| ExplainError::CorruptPdf {
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ExplainError::EmptyDocument);
    }
    debug!("extracting text from {total_pages} pages");

    let mut sections = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExplainError::PageTextFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let text = page.text().map_err(|e| ExplainError::PageTextFailed {
            page: idx + 1,
            detail: format!("{e:?}"),
        })?;

        sections.push(text.all());
    }

    Ok(sections.join("\n\n"))
}
