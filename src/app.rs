//! Wiring: turn a [`Config`] into a ready [`Vault`].
//!
//! | Config value | Implementation |
//! |--------------|----------------|
//! | `embedding.provider = "gemini"` | [`GeminiEmbedder`] |
//! | `embedding.provider = "openai"` | [`OpenAIEmbedder`] |
//! | `embedding.provider = "hashing"` | [`HashingEmbedder`] (offline) |
//! | `vector_store.provider = "sqlite"` | [`SqliteVectorStore`] |
//! | `vector_store.provider = "pinecone"` | [`PineconeStore`] |
//! | `vector_store.provider = "memory"` | [`InMemoryVectorStore`] |
//! | `llm.provider = "gemini"` / `"openai"` | [`GeminiModel`] / [`OpenAIChatModel`] |
//! | `extraction.pdf_reader = "model"` / `"local"` | [`GeminiReader`] / [`PdfExtractReader`] |

use std::sync::Arc;

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::info;

use memory_vault_core::embedding::{Embedder, HashingEmbedder};
use memory_vault_core::extract::DocumentReader;
use memory_vault_core::llm::LanguageModel;
use memory_vault_core::pipeline::Vault;
use memory_vault_core::store::memory::InMemoryVectorStore;
use memory_vault_core::store::VectorStore;

use crate::config::{Config, EmbeddingConfig, ExtractionConfig, LlmConfig};
use crate::db;
use crate::extract::PdfExtractReader;
use crate::gemini::{GeminiEmbedder, GeminiModel, GeminiReader};
use crate::migrate::migrate_pool;
use crate::object_store::FsObjectStore;
use crate::openai::{OpenAIChatModel, OpenAIEmbedder};
use crate::pinecone::PineconeStore;
use crate::sqlite_store::{SqliteDocumentStore, SqliteVectorStore};

pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let model = config.model_or_default();
    let dims = config.dims_or_default();
    let base_url = config.base_url.as_deref();
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiEmbedder::new(
            &model,
            dims,
            base_url,
            config.timeout_secs,
            config.max_retries,
        )?),
        "openai" => Arc::new(OpenAIEmbedder::new(
            &model,
            dims,
            base_url,
            config.timeout_secs,
            config.max_retries,
        )?),
        "hashing" => Arc::new(HashingEmbedder::new(dims)),
        other => bail!("Unknown embedding provider: {}", other),
    };
    Ok(embedder)
}

pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let model = config.model_or_default();
    let base_url = config.base_url.as_deref();
    let model: Arc<dyn LanguageModel> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiModel::new(
            &model,
            config.temperature,
            base_url,
            config.timeout_secs,
        )?),
        "openai" => Arc::new(OpenAIChatModel::new(
            &model,
            config.temperature,
            base_url,
            config.timeout_secs,
        )?),
        other => bail!("Unknown llm provider: {}", other),
    };
    Ok(model)
}

pub fn create_reader(config: &ExtractionConfig) -> Result<Option<Arc<dyn DocumentReader>>> {
    let reader: Option<Arc<dyn DocumentReader>> = match config.pdf_reader.as_str() {
        "model" => Some(Arc::new(GeminiReader::new(
            &config.model,
            config.base_url.as_deref(),
            config.timeout_secs,
        )?)),
        "local" => Some(Arc::new(PdfExtractReader)),
        "disabled" => None,
        other => bail!("Unknown extraction.pdf_reader: {}", other),
    };
    Ok(reader)
}

pub fn create_vector_store(
    config: &Config,
    pool: &SqlitePool,
    embedder: &dyn Embedder,
) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.vector_store.provider.as_str() {
        "sqlite" => Arc::new(SqliteVectorStore::new(pool.clone(), embedder.model_name())),
        "pinecone" => Arc::new(PineconeStore::new(&config.vector_store)?),
        "memory" => Arc::new(InMemoryVectorStore::new()),
        other => bail!("Unknown vector store provider: {}", other),
    };
    Ok(store)
}

/// MIME type for a file name by extension; `application/octet-stream` when
/// unknown.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        _ => "application/octet-stream",
    }
}

/// Connect to the database, ensure the schema, and assemble every
/// collaborator named in `config`.
pub async fn build_vault(config: &Config) -> Result<Vault> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;

    let embedder = create_embedder(&config.embedding)?;
    let vectors = create_vector_store(config, &pool, embedder.as_ref())?;
    let model = create_model(&config.llm)?;

    let mut builder = Vault::builder()
        .objects(Arc::new(FsObjectStore::new(&config.storage.root)))
        .documents(Arc::new(SqliteDocumentStore::new(pool)))
        .vectors(vectors)
        .embedder(embedder.clone())
        .model(model.clone())
        .params(config.pipeline_params());
    if let Some(reader) = create_reader(&config.extraction)? {
        builder = builder.reader(reader);
    }

    info!(
        embedding = embedder.model_name(),
        dims = embedder.dims(),
        vector_store = %config.vector_store.provider,
        llm = model.model_name(),
        pdf_reader = %config.extraction.pdf_reader,
        "vault ready"
    );
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn offline_config(dir: &std::path::Path, pdf_reader: &str) -> Config {
        parse_config(&format!(
            r#"
[db]
path = "{db}"

[storage]
root = "{objects}"

[embedding]
provider = "hashing"
dims = 64

[extraction]
pdf_reader = "{pdf_reader}"

[server]
bind = "127.0.0.1:0"
"#,
            db = dir.join("vault.sqlite").display(),
            objects = dir.join("objects").display(),
        ))
        .unwrap()
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(guess_content_type("report.PDF"), "application/pdf");
        assert_eq!(guess_content_type("notes.md"), "text/markdown");
        assert_eq!(guess_content_type("plain.txt"), "text/plain");
        assert_eq!(guess_content_type("README"), "application/octet-stream");
        assert_eq!(guess_content_type("archive.tar.gz"), "application/octet-stream");
    }

    #[test]
    fn hashing_embedder_needs_no_key() {
        let cfg = EmbeddingConfig {
            provider: "hashing".to_string(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&cfg).unwrap();
        assert_eq!(embedder.dims(), 32);
        assert_eq!(embedder.model_name(), "hashing");
    }

    #[test]
    fn reader_selection() {
        let local = ExtractionConfig {
            pdf_reader: "local".to_string(),
            ..ExtractionConfig::default()
        };
        assert_eq!(create_reader(&local).unwrap().unwrap().name(), "pdf-extract");

        let disabled = ExtractionConfig {
            pdf_reader: "disabled".to_string(),
            ..ExtractionConfig::default()
        };
        assert!(create_reader(&disabled).unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_vector_store_wired_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = offline_config(dir.path(), "local");
        let pool = db::connect(&cfg).await.unwrap();
        migrate_pool(&pool).await.unwrap();
        let embedder = create_embedder(&cfg.embedding).unwrap();
        let store = create_vector_store(&cfg, &pool, embedder.as_ref()).unwrap();
        assert!(store.query(&[0.0; 64], 3, "nobody").await.unwrap().is_empty());
    }
}
