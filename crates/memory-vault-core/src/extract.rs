//! Text extraction from uploaded bytes.
//!
//! Plain-text formats are decoded as UTF-8 in place. Complex formats (PDF)
//! are handed to a [`DocumentReader`]: a multimodal model or a local parser
//! supplied by the application. Either way the result must contain some
//! non-whitespace text, or extraction fails.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{chain, PipelineError};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Non-`text/*` MIME types that are still plain UTF-8.
const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/x-yaml",
    "application/yaml",
    "application/csv",
    "application/x-ndjson",
];

/// Turns a complex document format into plain text.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Short identifier for logs (e.g. `"gemini"`, `"pdf-extract"`).
    fn name(&self) -> &str;

    /// Whether this reader understands `content_type`.
    fn supports(&self, content_type: &str) -> bool;

    /// Produce the document's text.
    async fn read(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Strip MIME parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether `content_type` names a format that is decoded as UTF-8 directly.
pub fn is_plain_text(content_type: &str) -> bool {
    let mime = base_mime(content_type);
    mime.starts_with("text/") || TEXTUAL_APPLICATION_TYPES.contains(&mime.as_str())
}

/// Extract plain text from `bytes` declared as `content_type`.
///
/// An empty or unknown content type is treated as text when the bytes are
/// valid UTF-8. Fails with [`PipelineError::Extraction`] when no reader can
/// handle the type, the reader errors, or the result is blank.
pub async fn extract_text(
    bytes: &[u8],
    content_type: &str,
    reader: Option<&dyn DocumentReader>,
) -> Result<String, PipelineError> {
    let mime = base_mime(content_type);

    let text = if is_plain_text(&mime) {
        decode_utf8(bytes)?
    } else if let Some(reader) = reader.filter(|r| r.supports(&mime)) {
        debug!(reader = reader.name(), content_type = %mime, "delegating extraction");
        reader
            .read(bytes, &mime)
            .await
            .map_err(|e| PipelineError::Extraction(chain(&e)))?
    } else if mime.is_empty() || mime == "application/octet-stream" {
        decode_utf8(bytes).map_err(|_| {
            PipelineError::Extraction("unrecognized binary content".to_string())
        })?
    } else {
        return Err(PipelineError::Extraction(format!(
            "unsupported content-type: {}",
            mime
        )));
    };

    if text.trim().is_empty() {
        return Err(PipelineError::Extraction(
            "document has no extractable text".to_string(),
        ));
    }

    Ok(text)
}

fn decode_utf8(bytes: &[u8]) -> Result<String, PipelineError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| PipelineError::Extraction(format!("invalid UTF-8: {}", e)))
}
