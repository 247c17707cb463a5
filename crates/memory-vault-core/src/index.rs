//! Embedding and indexing of chunks.
//!
//! Each chunk is tagged with its owner and parent document, embedded, and
//! written to the shared vector index. Batches are processed sequentially;
//! a failure in any batch aborts the run and leaves earlier batches in the
//! index.

use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{chain, PipelineError};
use crate::models::{Chunk, ChunkRecord};
use crate::store::VectorStore;

/// Attach owner and document identifiers to chunks.
///
/// Each record gets a fresh UUID, so indexing the same document twice
/// stores two copies of every chunk.
pub fn tag_chunks(chunks: &[Chunk], owner_id: &str, document_id: &str) -> Vec<ChunkRecord> {
    chunks
        .iter()
        .map(|c| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            document_id: document_id.to_string(),
            chunk_index: c.chunk_index,
            text: c.text.clone(),
            hash: c.hash.clone(),
        })
        .collect()
}

/// Embed and store `chunks` for `(owner_id, document_id)`.
///
/// `batch_size` bounds the number of texts per embedding call (0 means a
/// single batch). Returns the number of records written.
pub async fn index_chunks(
    chunks: &[Chunk],
    owner_id: &str,
    document_id: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    batch_size: usize,
) -> Result<usize, PipelineError> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let records = tag_chunks(chunks, owner_id, document_id);
    let batch_size = if batch_size == 0 {
        records.len()
    } else {
        batch_size
    };

    let mut written = 0usize;
    for batch in records.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| PipelineError::Indexing(chain(&e)))?;

        if vectors.len() != batch.len() {
            return Err(PipelineError::Indexing(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }

        store
            .upsert(batch, &vectors)
            .await
            .map_err(|e| PipelineError::Indexing(chain(&e)))?;

        written += batch.len();
        debug!(document_id, written, total = records.len(), "indexed batch");
    }

    info!(
        document_id,
        owner_id,
        chunks = written,
        model = embedder.model_name(),
        "stored chunks in vector index"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::embedding::HashingEmbedder;
    use crate::models::RetrievedChunk;
    use crate::store::memory::InMemoryVectorStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0, 1.0]])
        }
    }

    /// Accepts a fixed number of upserts, then fails.
    struct FlakyStore {
        inner: InMemoryVectorStore,
        remaining: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        async fn upsert(&self, records: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<()> {
            if self.remaining.load(Ordering::SeqCst) == 0 {
                anyhow::bail!("index unavailable");
            }
            self.remaining.fetch_sub(1, Ordering::SeqCst);
            self.inner.upsert(records, vectors).await
        }
        async fn query(&self, v: &[f32], k: usize, owner: &str) -> Result<Vec<RetrievedChunk>> {
            self.inner.query(v, k, owner).await
        }
    }

    #[test]
    fn tagging_carries_owner_and_document() {
        let chunks = chunk_text(&"x".repeat(2500), 1000, 200);
        let records = tag_chunks(&chunks, "u1", "doc-9");
        assert_eq!(records.len(), chunks.len());
        for (r, c) in records.iter().zip(chunks.iter()) {
            assert_eq!(r.owner_id, "u1");
            assert_eq!(r.document_id, "doc-9");
            assert_eq!(r.chunk_index, c.chunk_index);
            assert_eq!(r.text, c.text);
        }
    }

    #[tokio::test]
    async fn indexes_all_chunks_in_batches() {
        let chunks = chunk_text(&"word ".repeat(1000), 100, 20);
        let store = InMemoryVectorStore::new();
        let written = index_chunks(&chunks, "u1", "d1", &HashingEmbedder::new(32), &store, 4)
            .await
            .unwrap();
        assert_eq!(written, chunks.len());
        assert_eq!(store.records_for_document("d1").len(), chunks.len());
    }

    #[tokio::test]
    async fn empty_chunk_list_is_noop() {
        let store = InMemoryVectorStore::new();
        let written = index_chunks(&[], "u1", "d1", &HashingEmbedder::new(8), &store, 0)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_indexing_error() {
        let chunks = chunk_text(&"abc ".repeat(600), 1000, 200);
        assert!(chunks.len() > 1);
        let store = InMemoryVectorStore::new();
        let err = index_chunks(&chunks, "u1", "d1", &ShortEmbedder, &store, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Indexing(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failure_midway_leaves_earlier_batches() {
        let chunks = chunk_text(&"abc ".repeat(600), 100, 10);
        let store = FlakyStore {
            inner: InMemoryVectorStore::new(),
            remaining: AtomicUsize::new(1),
        };
        let err = index_chunks(&chunks, "u1", "d1", &HashingEmbedder::new(8), &store, 2)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("index unavailable"));
        assert_eq!(store.inner.len(), 2);
    }
}
