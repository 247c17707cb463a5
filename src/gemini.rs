//! Google Gemini clients: embeddings, text generation, document reading,
//! and model listing.
//!
//! All requests authenticate with the `x-goog-api-key` header using the key
//! from `GOOGLE_API_KEY`.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use memory_vault_core::embedding::Embedder;
use memory_vault_core::extract::{DocumentReader, MIME_PDF};
use memory_vault_core::llm::LanguageModel;

use crate::http::{self, ApiKey, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Instruction sent alongside inline document bytes.
pub const EXTRACTION_INSTRUCTION: &str =
    "Extract all text from this document. Return only the raw text, with no commentary or formatting.";

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_BATCH: usize = 100;

const PROVIDER: &str = "gemini";

// ============ Wire types ============

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content,
    task_type: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// One entry from `GET /models`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

// ============ Shared client ============

#[derive(Clone)]
struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl GeminiClient {
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
                .header("x-goog-api-key", key)
                .json(body)
        })
        .await
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<String> {
        let response: GenerateContentResponse = self
            .post(&format!("models/{}:generateContent", model), request, 0)
            .await?;
        Ok(response_text(response)?)
    }
}

fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| ProviderError::Parse {
            provider: PROVIDER,
            message: "missing candidates[0].content".to_string(),
        })?;

    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    Ok(text)
}

// ============ Embeddings ============

/// Embeds with `text-embedding-004` style models. Documents use task type
/// `RETRIEVAL_DOCUMENT`, queries `RETRIEVAL_QUERY`.
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl GeminiEmbedder {
    pub fn new(
        model: &str,
        dims: usize,
        base_url: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(base_url, timeout_secs)?,
            model: model.to_string(),
            dims,
            max_retries,
        })
    }

    fn request<'a>(&self, text: &str, task_type: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: model_resource(&self.model),
            content: Content {
                role: None,
                parts: vec![Part::text(text)],
            },
            task_type,
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let body = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|t| self.request(t, "RETRIEVAL_DOCUMENT"))
                    .collect(),
            };
            let response: BatchEmbedResponse = self
                .client
                .post(
                    &format!("{}:batchEmbedContents", model_resource(&self.model)),
                    &body,
                    self.max_retries,
                )
                .await?;
            if response.embeddings.len() != batch.len() {
                anyhow::bail!(
                    "gemini returned {} embeddings for {} texts",
                    response.embeddings.len(),
                    batch.len()
                );
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        debug!(model = %self.model, texts = texts.len(), "embedded documents");
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = self.request(text, "RETRIEVAL_QUERY");
        let response: EmbedContentResponse = self
            .client
            .post(
                &format!("{}:embedContent", model_resource(&self.model)),
                &body,
                self.max_retries,
            )
            .await?;
        Ok(response.embedding.values)
    }
}

// ============ Generation ============

pub struct GeminiModel {
    client: GeminiClient,
    model: String,
    temperature: f32,
}

impl GeminiModel {
    pub fn new(
        model: &str,
        temperature: f32,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(base_url, timeout_secs)?,
            model: model.to_string(),
            temperature,
        })
    }
}

fn text_request(prompt: &str, temperature: f32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(prompt)],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, "gemini generateContent");
        self.client
            .generate(&self.model, &text_request(prompt, self.temperature))
            .await
    }
}

// ============ Document reading ============

/// Reads PDFs by sending them to a multimodal model as inline data.
pub struct GeminiReader {
    client: GeminiClient,
    model: String,
}

impl GeminiReader {
    pub fn new(model: &str, base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(base_url, timeout_secs)?,
            model: model.to_string(),
        })
    }
}

fn inline_request(bytes: &[u8], content_type: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: content_type.to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    }),
                },
                Part::text(EXTRACTION_INSTRUCTION),
            ],
        }],
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

#[async_trait]
impl DocumentReader for GeminiReader {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports(&self, content_type: &str) -> bool {
        content_type == MIME_PDF
    }

    async fn read(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        debug!(model = %self.model, bytes = bytes.len(), "reading document with gemini");
        self.client
            .generate(&self.model, &inline_request(bytes, content_type))
            .await
    }
}

// ============ Model listing ============

/// List every model that supports `generateContent`, following pagination.
pub async fn list_models(base_url: Option<&str>, timeout_secs: u64) -> Result<Vec<ModelInfo>> {
    let client = GeminiClient::new(base_url, timeout_secs)?;
    let url = format!("{}/models", client.base_url);
    let key = client.api_key.get()?;
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let response: ListModelsResponse = http::send_json(PROVIDER, 0, || {
            let mut req = client
                .http
                .get(&url)
                .header("x-goog-api-key", key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            req
        })
        .await?;

        models.extend(response.models.into_iter().filter(supports_generation));
        match response.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(models)
}

fn supports_generation(model: &ModelInfo) -> bool {
    model
        .supported_generation_methods
        .iter()
        .any(|m| m == "generateContent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_shape() {
        let body = serde_json::to_value(text_request("Hello", 0.0)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
        assert!(body["contents"][0]["parts"][0].get("inlineData").is_none());
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn inline_request_carries_base64_and_instruction() {
        let body = serde_json::to_value(inline_request(b"%PDF-1.4", MIME_PDF)).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0xLjQ=");
        assert_eq!(parts[1]["text"], EXTRACTION_INSTRUCTION);
    }

    #[test]
    fn embed_request_uses_task_type_and_model_resource() {
        let req = EmbedContentRequest {
            model: model_resource("text-embedding-004"),
            content: Content {
                role: None,
                parts: vec![Part::text("hi")],
            },
            task_type: "RETRIEVAL_QUERY",
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["model"], "models/text-embedding-004");
        assert_eq!(body["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(body["content"]["parts"][0]["text"], "hi");
        assert_eq!(model_resource("models/x"), "models/x");
    }

    #[test]
    fn parses_generate_response() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Paris"}, {"text": "."}]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response_text(resp).unwrap(), "Paris.");
    }

    #[test]
    fn missing_candidates_is_parse_error() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response_text(resp),
            Err(ProviderError::Parse { .. })
        ));
    }

    #[test]
    fn parses_embedding_responses() {
        let single: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, 0.2]}}"#).unwrap();
        assert_eq!(single.embedding.values, vec![0.1, 0.2]);

        let batch: BatchEmbedResponse = serde_json::from_str(
            r#"{"embeddings": [{"values": [1.0]}, {"values": [2.0]}]}"#,
        )
        .unwrap();
        assert_eq!(batch.embeddings.len(), 2);
        assert_eq!(batch.embeddings[1].values, vec![2.0]);
    }

    #[test]
    fn filters_models_by_generate_content() {
        let json = r#"{
            "models": [
                {"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash",
                 "supportedGenerationMethods": ["generateContent", "countTokens"]},
                {"name": "models/text-embedding-004",
                 "supportedGenerationMethods": ["embedContent"]}
            ],
            "nextPageToken": ""
        }"#;
        let resp: ListModelsResponse = serde_json::from_str(json).unwrap();
        let usable: Vec<_> = resp.models.into_iter().filter(supports_generation).collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "models/gemini-2.0-flash");
        assert_eq!(usable[0].display_name.as_deref(), Some("Gemini 2.0 Flash"));
    }
}
