//! Page-to-text conversion.
//!
//! Two ways to turn an uploaded PDF page into text, selected per request:
//!
//! * [`StructuralParser`] — layout-aware extraction via pdfium, page by
//!   page, no model involved.
//! * [`VisionParser`] — rasterise the page and have the parsing-role model
//!   transcribe it.
//!
//! The selection is a two-way branch, so the facade is a tagged variant
//! rather than a trait hierarchy. Failures propagate unmodified — there is
//! deliberately no fallback to empty text, so the transport layer can
//! distinguish a parse error from a successful-but-empty extraction.

pub mod encode;
pub mod render;
pub mod structural;
pub mod vision;

pub use structural::StructuralParser;
pub use vision::VisionParser;

use crate::config::AppConfig;
use crate::error::ExplainError;
use crate::llm::{ModelResolver, ModelRole};

/// The two parsing strategies.
pub enum PageParser {
    Structural(StructuralParser),
    Vision(VisionParser),
}

impl PageParser {
    /// Build the parser selected by the request's `parse_with_llm` flag.
    ///
    /// The vision variant resolves its model here, so a configuration
    /// problem surfaces before any rasterisation work happens.
    pub fn from_flag(
        use_llm_parsing: bool,
        resolver: &ModelResolver,
        config: &AppConfig,
    ) -> Result<Self, ExplainError> {
        if use_llm_parsing {
            let model = resolver.resolve(ModelRole::Parsing, config.max_tokens)?;
            Ok(PageParser::Vision(VisionParser::new(model, config)))
        } else {
            Ok(PageParser::Structural(StructuralParser::new()))
        }
    }

    /// Extract text from the uploaded PDF bytes.
    pub async fn produce_text(&self, pdf_bytes: &[u8]) -> Result<String, ExplainError> {
        match self {
            PageParser::Structural(parser) => parser.produce_text(pdf_bytes).await,
            PageParser::Vision(parser) => parser.produce_text(pdf_bytes).await,
        }
    }
}
