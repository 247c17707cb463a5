//! In-memory store implementations for testing and offline runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over the records that
//! match the owner filter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, Document, DocumentStatus, RetrievedChunk};

use super::{DocumentStore, ObjectStore, VectorStore};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

// ============ Objects ============

/// A stored object: bytes plus the declared content type.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        write(&self.objects)?.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

// ============ Documents ============

/// Documents keyed by id. Each entry keeps its insertion sequence, which
/// breaks ties between documents created in the same second.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, (u64, Document)>>,
    next_seq: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        let mut docs = write(&self.docs)?;
        if docs.contains_key(&doc.id) {
            bail!("document {} already exists", doc.id);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        docs.insert(doc.id.clone(), (seq, doc.clone()));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.docs)?.get(id).map(|(_, d)| d.clone()))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let mut docs: Vec<(u64, Document)> = read(&self.docs)?
            .values()
            .filter(|(_, d)| d.owner_id == owner_id)
            .cloned()
            .collect();
        docs.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(docs.into_iter().map(|(_, d)| d).collect())
    }

    async fn set_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let (_, doc) = docs
            .get_mut(id)
            .ok_or_else(|| anyhow!("document not found: {}", id))?;
        doc.status = status;
        Ok(())
    }
}

// ============ Vectors ============

struct StoredVector {
    record: ChunkRecord,
    vector: Vec<f32>,
}

/// Brute-force in-memory vector index.
#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all owners.
    pub fn len(&self) -> usize {
        self.vectors.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records stored for a given document, in insertion order.
    pub fn records_for_document(&self, document_id: &str) -> Vec<ChunkRecord> {
        self.vectors
            .read()
            .map(|v| {
                v.iter()
                    .filter(|sv| sv.record.document_id == document_id)
                    .map(|sv| sv.record.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<()> {
        if records.len() != vectors.len() {
            bail!(
                "record/vector count mismatch: {} records, {} vectors",
                records.len(),
                vectors.len()
            );
        }
        let mut stored = write(&self.vectors)?;
        for (record, vector) in records.iter().zip(vectors.iter()) {
            stored.retain(|sv| sv.record.id != record.id);
            stored.push(StoredVector {
                record: record.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_id: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let stored = read(&self.vectors)?;
        let mut hits: Vec<RetrievedChunk> = stored
            .iter()
            .filter(|sv| sv.record.owner_id == owner_id)
            .map(|sv| RetrievedChunk {
                text: sv.record.text.clone(),
                score: cosine_similarity(vector, &sv.vector),
                document_id: sv.record.document_id.clone(),
                owner_id: sv.record.owner_id.clone(),
                chunk_index: sv.record.chunk_index,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
