//! Generative language model trait.

use anyhow::Result;
use async_trait::async_trait;

/// A text-in, text-out language model.
///
/// Implementations are expected to run with the sampling temperature they
/// were constructed with; the synthesizer relies on a temperature of zero
/// for reproducible answers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
