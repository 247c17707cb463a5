//! Embedding model trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! an offline [`HashingEmbedder`], and pure helpers for vector
//! serialization and similarity computation.
//!
//! Network-backed embedders (Gemini, OpenAI) live in the `memory-vault`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// An embedding model: text in, fixed-dimension vectors out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a batch of passages for storage. Output order matches input.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query.
    ///
    /// Providers that distinguish query and document task types override
    /// this; the default embeds the query as a one-element batch.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_documents(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

// ============ Hashing Embedder ============

/// Deterministic feature-hashing embedder.
///
/// Lowercases the text, splits it into alphanumeric words, and hashes each
/// word (first 8 bytes of its SHA-256) into one of `dims` buckets. The bag-of-words vector is
/// L2-normalized, so cosine similarity reflects shared vocabulary. Needs
/// no network and no model files.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (word_hash(&word.to_lowercase()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn word_hash(word: &str) -> u64 {
    let digest = Sha256::digest(word.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use memory_vault_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_normalized() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_query("The capital of France is Paris.").await.unwrap();
        let b = e.embed_query("The capital of France is Paris.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn hashing_embedder_ranks_shared_vocabulary_higher() {
        let e = HashingEmbedder::new(256);
        let docs = vec![
            "The capital of France is Paris.".to_string(),
            "Bananas are rich in potassium.".to_string(),
        ];
        let vecs = e.embed_documents(&docs).await.unwrap();
        let q = e.embed_query("What is the capital of France?").await.unwrap();
        assert!(cosine_similarity(&q, &vecs[0]) > cosine_similarity(&q, &vecs[1]));
    }

    #[tokio::test]
    async fn hashing_embedder_ignores_case_and_punctuation() {
        let e = HashingEmbedder::new(128);
        let a = e.embed_query("PARIS, France!").await.unwrap();
        let b = e.embed_query("paris france").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(word_hash("paris"), word_hash("paris"));
        assert_ne!(word_hash("paris"), word_hash("france"));
    }

    #[tokio::test]
    async fn hashing_embedder_handles_empty_text() {
        let e = HashingEmbedder::new(8);
        let v = e.embed_query("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
