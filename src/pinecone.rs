//! Pinecone vector store over the REST data plane.
//!
//! One index is shared by every owner. Each vector carries
//! `{text, userId, documentId, chunkIndex}` metadata and queries filter on
//! `userId`. When no data-plane host is configured it is looked up once
//! from the control plane by index name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use memory_vault_core::models::{ChunkRecord, RetrievedChunk};
use memory_vault_core::store::VectorStore;

use crate::config::VectorStoreConfig;
use crate::http::{self, ApiKey};

const PROVIDER: &str = "pinecone";
const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Vectors per upsert request (Pinecone limit: 1000 vectors or 2 MB).
const UPSERT_BATCH: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub text: String,
    pub user_id: String,
    pub document_id: String,
    pub chunk_index: i64,
}

#[derive(Debug, Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: ChunkMetadata,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    filter: serde_json::Value,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    metadata: Option<ChunkMetadata>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// Metadata filter restricting a query to one owner's vectors.
pub fn owner_filter(owner_id: &str) -> serde_json::Value {
    json!({ "userId": { "$eq": owner_id } })
}

fn to_retrieved(m: QueryMatch) -> Option<RetrievedChunk> {
    let meta = m.metadata?;
    Some(RetrievedChunk {
        text: meta.text,
        score: m.score,
        document_id: meta.document_id,
        owner_id: meta.user_id,
        chunk_index: meta.chunk_index,
    })
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

pub struct PineconeStore {
    http: reqwest::Client,
    api_key: ApiKey,
    index: String,
    namespace: Option<String>,
    host: OnceCell<String>,
}

impl PineconeStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let host = OnceCell::new();
        if let Some(h) = &config.host {
            // A fresh cell cannot already be set.
            let _ = host.set(with_scheme(h));
        }
        Ok(Self {
            http: http::client(config.timeout_secs)?,
            api_key: ApiKey::from_env(&config.api_key_env),
            index: config.index.clone(),
            namespace: config.namespace.clone(),
            host,
        })
    }

    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", CONTROL_PLANE, self.index);
                let key = self.api_key.get()?;
                let described: DescribeIndexResponse = http::send_json(PROVIDER, 0, || {
                    self.http
                        .get(&url)
                        .header("Api-Key", key)
                        .header("X-Pinecone-API-Version", API_VERSION)
                })
                .await
                .with_context(|| format!("failed to resolve host for index '{}'", self.index))?;
                info!(index = %self.index, host = %described.host, "resolved pinecone index host");
                Ok::<_, anyhow::Error>(with_scheme(&described.host))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.host().await?, path);
        let key = self.api_key.get()?;
        Ok(http::send_json(PROVIDER, 0, || {
            self.http
                .post(&url)
                .header("Api-Key", key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(body)
        })
        .await?)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<()> {
        if records.len() != vectors.len() {
            anyhow::bail!(
                "record/vector count mismatch: {} records, {} vectors",
                records.len(),
                vectors.len()
            );
        }

        let pairs: Vec<(&ChunkRecord, &Vec<f32>)> = records.iter().zip(vectors).collect();
        for batch in pairs.chunks(UPSERT_BATCH) {
            let body = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|(r, v)| PineconeVector {
                        id: &r.id,
                        values: v.as_slice(),
                        metadata: ChunkMetadata {
                            text: r.text.clone(),
                            user_id: r.owner_id.clone(),
                            document_id: r.document_id.clone(),
                            chunk_index: r.chunk_index,
                        },
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };
            let resp: UpsertResponse = self.post("vectors/upsert", &body).await?;
            debug!(index = %self.index, upserted = resp.upserted_count, "pinecone upsert");
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_id: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let body = QueryRequest {
            vector,
            top_k,
            filter: owner_filter(owner_id),
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let resp: QueryResponse = self.post("query", &body).await?;
        Ok(resp.matches.into_iter().filter_map(to_retrieved).collect())
    }
}
