//! Core data models used throughout Memory Vault.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Stored and recorded; indexing has not completed.
    Uploaded,
    /// All chunks were embedded and written to the vector store.
    Indexed,
    /// Marked unusable by an operator or an external process.
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "indexed" => Ok(DocumentStatus::Indexed),
            "failed" => Ok(DocumentStatus::Failed),
            other => anyhow::bail!("unknown document status: '{}'", other),
        }
    }
}

/// A document record in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub status: DocumentStatus,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// A passage of extracted text produced by the chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_index: i64,
    /// Offset of the first character, counted in chars.
    pub start: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk tagged with its owner and parent document, ready for the
/// vector store. Records are write-once.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub owner_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A single similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub document_id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub chunk_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "INDEXED".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::Indexed
        );
        assert_eq!(
            "uploaded".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::Uploaded
        );
        assert!("pending".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DocumentStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
