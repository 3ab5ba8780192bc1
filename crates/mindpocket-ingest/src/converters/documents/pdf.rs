use mindpocket_core::{ConversionResult, Result};

use super::{malformed, DocumentConverter};
use crate::converters::html::normalize_markdown;

/// Text layer of a PDF via `pdf-extract`.
pub struct PdfConverter;

impl DocumentConverter for PdfConverter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".pdf"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let text = pdf_extract::extract_text_from_mem(data).map_err(|e| malformed("PDF", e))?;
        let markdown = normalize_markdown(&text.replace('\u{c}', "\n\n"));
        if markdown.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(None, markdown)))
    }
}
