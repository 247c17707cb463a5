//! Storage abstractions consumed by the pipeline.
//!
//! Three external collaborators sit behind these traits:
//!
//! | Trait | Holds | App implementation |
//! |-------|-------|--------------------|
//! | [`ObjectStore`] | raw uploaded bytes | filesystem |
//! | [`DocumentStore`] | [`Document`] records and their status | SQLite |
//! | [`VectorStore`] | chunk embeddings + owner/document metadata | Pinecone, SQLite |
//!
//! [`memory`] provides in-process implementations of all three.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, Document, DocumentStatus, RetrievedChunk};

/// Blob storage for the original uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at an owner-scoped `path`.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;
}

/// Metadata store for [`Document`] records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document record.
    async fn insert(&self, doc: &Document) -> Result<()>;

    /// Fetch a document by ID.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// All documents belonging to `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Document>>;

    /// Update the lifecycle status of a document.
    async fn set_status(&self, id: &str, status: DocumentStatus) -> Result<()>;
}

/// Similarity index over chunk embeddings.
///
/// All owners share one index; isolation is by the `owner_id` metadata on
/// each record, applied as a filter at query time.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store records with their vectors. `vectors[i]` belongs to `records[i]`.
    async fn upsert(&self, records: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `top_k` records owned by `owner_id`, most similar first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_id: &str,
    ) -> Result<Vec<RetrievedChunk>>;
}
