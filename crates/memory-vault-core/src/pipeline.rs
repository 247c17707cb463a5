//! Pipeline orchestration.
//!
//! [`Vault`] owns one handle per external collaborator and sequences the
//! stages:
//!
//! - **upload**: object store → metadata record (`uploaded`) → ingest →
//!   status `indexed`
//! - **ingest**: extract → chunk → index
//! - **search**: retrieve
//! - **chat**: retrieve → synthesize
//!
//! A failure at any ingestion stage aborts the run and the document keeps
//! its `uploaded` status. No state is carried between requests.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::{chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedding::Embedder;
use crate::error::{chain, PipelineError};
use crate::extract::{extract_text, DocumentReader};
use crate::index::index_chunks;
use crate::llm::LanguageModel;
use crate::models::{Document, DocumentStatus, RetrievedChunk};
use crate::retrieve::{retrieve, DEFAULT_TOP_K};
use crate::store::{DocumentStore, ObjectStore, VectorStore};
use crate::synthesize::answer_with_k;

/// Tuning knobs for the pipeline, decoupled from application config.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Passages retrieved for search (when the caller gives no limit) and chat.
    pub top_k: usize,
    /// Texts per embedding call; 0 sends every chunk in one call.
    pub embed_batch_size: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_batch_size: 0,
        }
    }
}

impl PipelineParams {
    /// Reject settings the chunker and retriever cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            bail!("top_k must be at least 1");
        }
        Ok(())
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chars: usize,
    pub chunks: usize,
}

/// The document assistant: ingestion and question answering over
/// injected collaborators.
pub struct Vault {
    objects: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    reader: Option<Arc<dyn DocumentReader>>,
    params: PipelineParams,
}

/// Builder for [`Vault`]; every collaborator except the document reader is
/// required.
#[derive(Default)]
pub struct VaultBuilder {
    objects: Option<Arc<dyn ObjectStore>>,
    documents: Option<Arc<dyn DocumentStore>>,
    vectors: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    model: Option<Arc<dyn LanguageModel>>,
    reader: Option<Arc<dyn DocumentReader>>,
    params: PipelineParams,
}

impl VaultBuilder {
    pub fn objects(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn vectors(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Reader for complex formats such as PDF. Without one, only plain-text
    /// uploads can be ingested.
    pub fn reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn params(mut self, params: PipelineParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Result<Vault> {
        self.params.validate()?;
        Ok(Vault {
            objects: self.objects.ok_or_else(|| anyhow!("object store not configured"))?,
            documents: self
                .documents
                .ok_or_else(|| anyhow!("document store not configured"))?,
            vectors: self.vectors.ok_or_else(|| anyhow!("vector store not configured"))?,
            embedder: self.embedder.ok_or_else(|| anyhow!("embedder not configured"))?,
            model: self.model.ok_or_else(|| anyhow!("language model not configured"))?,
            reader: self.reader,
            params: self.params,
        })
    }
}

/// Owner-scoped storage path: `{owner}/{uuid}.{ext}`, or `{owner}/{uuid}`
/// when the file name has no extension.
pub fn storage_path(owner_id: &str, file_name: &str) -> String {
    let id = Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}/{}.{}", owner_id, id, ext)
        }
        _ => format!("{}/{}", owner_id, id),
    }
}

impl Vault {
    pub fn builder() -> VaultBuilder {
        VaultBuilder::default()
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Store an uploaded file, record it, and ingest it.
    ///
    /// Returns the document with status `indexed`. If ingestion fails the
    /// record stays `uploaded` and the ingestion error is returned.
    pub async fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<Document, PipelineError> {
        let path = storage_path(owner_id, file_name);
        self.objects
            .put(&path, bytes, content_type)
            .await
            .map_err(|e| PipelineError::Storage(chain(&e)))?;

        let mut doc = Document {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            file_name: file_name.to_string(),
            storage_path: path,
            content_type: content_type.to_string(),
            status: DocumentStatus::Uploaded,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.documents
            .insert(&doc)
            .await
            .map_err(|e| PipelineError::Storage(chain(&e)))?;

        info!(
            document_id = %doc.id,
            owner_id,
            file_name,
            bytes = bytes.len(),
            "document uploaded"
        );

        if let Err(e) = self.ingest(&doc, bytes).await {
            warn!(document_id = %doc.id, error = %e, "ingestion failed; status left as uploaded");
            return Err(e);
        }

        self.documents
            .set_status(&doc.id, DocumentStatus::Indexed)
            .await
            .map_err(|e| PipelineError::Storage(chain(&e)))?;
        doc.status = DocumentStatus::Indexed;

        Ok(doc)
    }

    /// Extract, chunk, and index an already recorded document.
    pub async fn ingest(&self, doc: &Document, bytes: &[u8]) -> Result<IngestReport, PipelineError> {
        let text = extract_text(bytes, &doc.content_type, self.reader.as_deref()).await?;

        let chunks = chunk_text(&text, self.params.chunk_size, self.params.chunk_overlap);
        info!(document_id = %doc.id, chunks = chunks.len(), "split document into chunks");

        let written = index_chunks(
            &chunks,
            &doc.owner_id,
            &doc.id,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            self.params.embed_batch_size,
        )
        .await?;

        Ok(IngestReport {
            chars: text.chars().count(),
            chunks: written,
        })
    }

    /// Similarity search over the owner's chunks.
    pub async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        retrieve(
            query,
            owner_id,
            limit.unwrap_or(self.params.top_k),
            self.embedder.as_ref(),
            self.vectors.as_ref(),
        )
        .await
    }

    /// Answer a question from the owner's documents.
    pub async fn chat(&self, owner_id: &str, query: &str) -> Result<String, PipelineError> {
        answer_with_k(
            query,
            owner_id,
            self.params.top_k,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            self.model.as_ref(),
        )
        .await
    }

    /// The owner's documents, newest first.
    pub async fn documents(&self, owner_id: &str) -> Result<Vec<Document>, PipelineError> {
        self.documents
            .list_for_owner(owner_id)
            .await
            .map_err(|e| PipelineError::Storage(chain(&e)))
    }

    /// Look up one document; documents of other owners are reported as absent.
    pub async fn document(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<Document>, PipelineError> {
        let doc = self
            .documents
            .get(id)
            .await
            .map_err(|e| PipelineError::Storage(chain(&e)))?;
        Ok(doc.filter(|d| d.owner_id == owner_id))
    }
}
