//! Owner-scoped similarity retrieval.
//!
//! The query is embedded and sent to the vector store with an owner filter.
//! Scoring and ordering come from the store. Results whose owner does not
//! match the caller are dropped here as well, so a store that ignores the
//! filter still cannot leak another owner's chunks.

use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::error::{chain, PipelineError};
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Default number of passages returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Return up to `top_k` of `owner_id`'s chunks most similar to `query`.
pub async fn retrieve(
    query: &str,
    owner_id: &str,
    top_k: usize,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<Vec<RetrievedChunk>, PipelineError> {
    if query.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "query must not be empty".to_string(),
        ));
    }
    if top_k == 0 {
        return Err(PipelineError::InvalidInput(
            "limit must be at least 1".to_string(),
        ));
    }

    let vector = embedder
        .embed_query(query)
        .await
        .map_err(|e| PipelineError::Retrieval(chain(&e)))?;

    let hits = store
        .query(&vector, top_k, owner_id)
        .await
        .map_err(|e| PipelineError::Retrieval(chain(&e)))?;

    let returned = hits.len();
    let mut hits: Vec<RetrievedChunk> = hits
        .into_iter()
        .filter(|h| h.owner_id == owner_id)
        .collect();
    if hits.len() != returned {
        warn!(
            owner_id,
            dropped = returned - hits.len(),
            "vector store returned chunks for another owner"
        );
    }
    hits.truncate(top_k);

    debug!(owner_id, results = hits.len(), "retrieval complete");
    Ok(hits)
}
