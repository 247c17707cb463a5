//! Pipeline error kinds.
//!
//! Collaborators report failures as `anyhow::Error`; the pipeline stages
//! classify them into one of these variants so callers (the HTTP layer,
//! the CLI) can map each kind to a distinct response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No text could be recovered from the uploaded bytes.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Embedding or vector-store write failed.
    #[error("indexing failed: {0}")]
    Indexing(String),

    /// Similarity query failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Language-model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Bearer token missing, malformed, or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Object storage or metadata store failed during upload.
    #[error("storage failed: {0}")]
    Storage(String),

    /// Caller supplied an unusable argument (empty query, zero limit).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "extraction_failed",
            PipelineError::Indexing(_) => "indexing_failed",
            PipelineError::Retrieval(_) => "retrieval_failed",
            PipelineError::Generation(_) => "generation_failed",
            PipelineError::Auth(_) => "unauthorized",
            PipelineError::Storage(_) => "storage_failed",
            PipelineError::InvalidInput(_) => "bad_request",
        }
    }
}

/// Render an `anyhow` chain as a single line (`outer: inner: root`).
pub(crate) fn chain(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
