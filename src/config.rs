//! TOML configuration.
//!
//! Every section except `[db]` and `[server]` has defaults, so a minimal
//! config only names the database path and the bind address. Secrets
//! (API keys, the JWT secret) are never read from the file; each section
//! names the environment variable that holds them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use memory_vault_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use memory_vault_core::pipeline::PipelineParams;
use memory_vault_core::retrieve::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory under which uploaded files are written as `{owner}/{file}`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/objects")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `gemini`, `openai`, or `hashing` (offline).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Override the provider's API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries for HTTP 429/5xx. Zero means every failure is final.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            base_url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Model name, falling back to the provider's default.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "openai" => "text-embedding-3-small",
                "hashing" => "hashing",
                _ => "text-embedding-004",
            }
            .to_string()
        })
    }

    /// Vector dimensionality, falling back to the provider's default.
    pub fn dims_or_default(&self) -> usize {
        self.dims.unwrap_or(match self.provider.as_str() {
            "openai" => 1536,
            "hashing" => 512,
            _ => 768,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// `sqlite`, `pinecone`, or `memory`.
    #[serde(default = "default_vector_provider")]
    pub provider: String,
    /// Index shared by every owner.
    #[serde(default = "default_index")]
    pub index: String,
    /// Data-plane host; resolved from the control plane when absent.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            index: default_index(),
            host: None,
            namespace: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_vector_provider() -> String {
    "sqlite".to_string()
}
fn default_index() -> String {
    "memoryvault".to_string()
}
fn default_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `gemini` or `openai`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            base_url: None,
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "openai" => "gpt-4o-mini",
                _ => "gemini-2.0-flash",
            }
            .to_string()
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// How PDFs are read: `model` (Gemini multimodal), `local`
    /// (pdf-extract), or `disabled`.
    #[serde(default = "default_pdf_reader")]
    pub pdf_reader: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_reader: default_pdf_reader(),
            model: default_extraction_model(),
            base_url: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_pdf_reader() -> String {
    "model".to_string()
}
fn default_extraction_model() -> String {
    "gemini-2.0-flash".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Environment variable holding the HS256 signing secret.
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
    /// Required `aud` claim, if any (Supabase issues `"authenticated"`).
    #[serde(default)]
    pub audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            audience: None,
        }
    }
}

fn default_jwt_secret_env() -> String {
    "SUPABASE_JWT_SECRET".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

impl Config {
    /// Pipeline tuning derived from the chunking, retrieval, and embedding
    /// sections.
    pub fn pipeline_params(&self) -> PipelineParams {
        PipelineParams {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
            embed_batch_size: self.embedding.batch_size,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "gemini" | "openai" | "hashing" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini, openai, or hashing.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.vector_store.provider.as_str() {
        "sqlite" | "pinecone" | "memory" => {}
        other => anyhow::bail!(
            "Unknown vector store provider: '{}'. Must be sqlite, pinecone, or memory.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    match config.extraction.pdf_reader.as_str() {
        "model" | "local" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown extraction.pdf_reader: '{}'. Must be model, local, or disabled.",
            other
        ),
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    Ok(config)
}
