//! OpenAI-compatible embeddings and chat completions.
//!
//! Calls `POST {base}/embeddings` and `POST {base}/chat/completions` with a
//! bearer token from `OPENAI_API_KEY`. The base URL is configurable so any
//! OpenAI-compatible server can be used.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use memory_vault_core::embedding::Embedder;
use memory_vault_core::llm::LanguageModel;

use crate::http::{self, ApiKey, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

struct OpenAIClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAIClient {
    fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http::client(timeout_secs)?,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: ApiKey::from_env(API_KEY_ENV),
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B, max_retries: u32) -> Result<T, ProviderError>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let key = self.api_key.get()?;
        http::send_json(PROVIDER, max_retries, || {
            self.http
                .post(&url)
                .header("Authorization", format!("Bearer {}", key))
                .json(body)
        })
        .await
    }
}

/// Embedding provider using the OpenAI API.
///
/// Batched (one call per `embed_documents`), with exponential backoff on
/// rate limits and server errors when `max_retries > 0`.
pub struct OpenAIEmbedder {
    client: OpenAIClient,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(
        model: &str,
        dims: usize,
        base_url: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: OpenAIClient::new(base_url, timeout_secs)?,
            model: model.to_string(),
            dims,
            max_retries,
        })
    }
}

/// Order embeddings by their `index` so they line up with the input.
fn ordered_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        anyhow::bail!(
            "openai returned {} embeddings for {} texts",
            response.data.len(),
            expected
        );
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = self
            .client
            .post("embeddings", &body, self.max_retries)
            .await?;
        debug!(model = %self.model, texts = texts.len(), "embedded documents");
        ordered_embeddings(response, texts.len())
    }
}

pub struct OpenAIChatModel {
    client: OpenAIClient,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    pub fn new(
        model: &str,
        temperature: f32,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: OpenAIClient::new(base_url, timeout_secs)?,
            model: model.to_string(),
            temperature,
        })
    }
}

fn chat_text(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Parse {
            provider: PROVIDER,
            message: "missing choices[0].message.content".to_string(),
        })
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
        };
        let response: ChatResponse = self.client.post("chat/completions", &body, 0).await?;
        Ok(chat_text(response)?)
    }
}
