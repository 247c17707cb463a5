//! Retrieval-augmented answer generation.
//!
//! Retrieved passages are joined into a context block and placed in a
//! fixed prompt that restricts the model to that context. When retrieval
//! comes back empty the model is not called at all and the caller gets
//! [`NO_INFORMATION_ANSWER`].

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::llm::LanguageModel;
use crate::models::RetrievedChunk;
use crate::retrieve::{retrieve, DEFAULT_TOP_K};
use crate::store::VectorStore;

/// Answer returned when none of the caller's documents match the question.
pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find any information about that in your documents.";

/// Build the generation prompt for `query` over `passages` (ranked order).
pub fn build_prompt(query: &str, passages: &[RetrievedChunk]) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful AI assistant named MemoryVault.\n\
         Use the following pieces of context to answer the question at the end.\n\
         If you don't know the answer based on the context, just say you don't know. \
         Do not try to make up an answer.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {query}\n\
         \n\
         ANSWER:\n"
    )
}

/// Answer `query` from `owner_id`'s documents.
///
/// Retrieval and generation failures both surface as
/// [`PipelineError::Generation`]; an empty query is
/// [`PipelineError::InvalidInput`].
pub async fn answer(
    query: &str,
    owner_id: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    model: &dyn LanguageModel,
) -> Result<String, PipelineError> {
    answer_with_k(query, owner_id, DEFAULT_TOP_K, embedder, store, model).await
}

/// [`answer`] with an explicit retrieval depth.
pub async fn answer_with_k(
    query: &str,
    owner_id: &str,
    top_k: usize,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    model: &dyn LanguageModel,
) -> Result<String, PipelineError> {
    let passages = retrieve(query, owner_id, top_k, embedder, store)
        .await
        .map_err(|e| match e {
            PipelineError::InvalidInput(msg) => PipelineError::InvalidInput(msg),
            other => PipelineError::Generation(other.to_string()),
        })?;

    if passages.is_empty() {
        info!(owner_id, "no matching passages; skipping generation");
        return Ok(NO_INFORMATION_ANSWER.to_string());
    }

    let prompt = build_prompt(query, &passages);
    debug!(
        owner_id,
        passages = passages.len(),
        prompt_chars = prompt.len(),
        model = model.model_name(),
        "generating answer"
    );

    model
        .generate(&prompt)
        .await
        .map_err(|e| PipelineError::Generation(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::index::index_chunks;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryVectorStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and answers with a fixed reply.
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
        reply: Result<String, String>,
    }

    impl RecordingModel {
        fn replying(reply: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Ok(reply.to_string()),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Err(msg.to_string()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|m| anyhow::anyhow!(m))
        }
    }

    fn passage(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            score: 1.0,
            document_id: "d".to_string(),
            owner_id: "u".to_string(),
            chunk_index: 0,
        }
    }

    async fn seeded_store(embedder: &HashingEmbedder, owner: &str, text: &str) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        let chunks = vec![Chunk {
            chunk_index: 0,
            start: 0,
            text: text.to_string(),
            hash: String::new(),
        }];
        index_chunks(&chunks, owner, "doc", embedder, &store, 0)
            .await
            .unwrap();
        store
    }

    #[test]
    fn prompt_contains_context_in_order_and_question() {
        let prompt = build_prompt("Why?", &[passage("first"), passage("second")]);
        assert!(prompt.contains("CONTEXT:\nfirst\n\nsecond\n"));
        assert!(prompt.contains("QUESTION:\nWhy?\n"));
        assert!(prompt.contains("Do not try to make up an answer."));
        assert!(prompt.trim_end().ends_with("ANSWER:"));
    }

    #[tokio::test]
    async fn empty_retrieval_returns_sentinel_without_model_call() {
        let embedder = HashingEmbedder::new(32);
        let store = InMemoryVectorStore::new();
        let model = RecordingModel::replying("should not be used");

        let out = answer("anything?", "u1", &embedder, &store, &model)
            .await
            .unwrap();
        assert_eq!(out, NO_INFORMATION_ANSWER);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn model_output_is_returned_verbatim() {
        let embedder = HashingEmbedder::new(32);
        let store = seeded_store(&embedder, "u1", "The capital of France is Paris.").await;
        let model = RecordingModel::replying("  Paris.\n");

        let out = answer("What is the capital of France?", "u1", &embedder, &store, &model)
            .await
            .unwrap();
        assert_eq!(out, "  Paris.\n");
        assert_eq!(model.calls(), 1);
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("The capital of France is Paris."));
    }

    #[tokio::test]
    async fn model_failure_is_generation_error() {
        let embedder = HashingEmbedder::new(32);
        let store = seeded_store(&embedder, "u1", "some text").await;
        let model = RecordingModel::failing("503 upstream");

        let err = answer("text?", "u1", &embedder, &store, &model)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        assert!(err.to_string().contains("503 upstream"));
    }

    #[tokio::test]
    async fn other_owner_gets_sentinel() {
        let embedder = HashingEmbedder::new(32);
        let store = seeded_store(&embedder, "u1", "The capital of France is Paris.").await;
        let model = RecordingModel::replying("Paris");

        let out = answer("What is the capital of France?", "u2", &embedder, &store, &model)
            .await
            .unwrap();
        assert_eq!(out, NO_INFORMATION_ANSWER);
        assert_eq!(model.calls(), 0);
    }
}
