//! Local PDF text extraction.
//!
//! An offline alternative to the model-based reader in [`crate::gemini`].
//! Parsing runs on the blocking pool.

use anyhow::Result;
use async_trait::async_trait;

use memory_vault_core::extract::{DocumentReader, MIME_PDF};

/// Extraction error. Never panics on malformed input.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract plain text from PDF bytes.
pub fn extract_pdf(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    if content_type != MIME_PDF {
        return Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        ));
    }
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// [`DocumentReader`] backed by the `pdf-extract` crate.
pub struct PdfExtractReader;

#[async_trait]
impl DocumentReader for PdfExtractReader {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn supports(&self, content_type: &str) -> bool {
        content_type == MIME_PDF
    }

    async fn read(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let bytes = bytes.to_vec();
        let content_type = content_type.to_string();
        let text =
            tokio::task::spawn_blocking(move || extract_pdf(&bytes, &content_type)).await??;
        Ok(text)
    }
}
