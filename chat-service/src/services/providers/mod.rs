//! External collaborator abstractions.
//!
//! The conversational core talks to its backends through these traits,
//! allowing easy swapping between real services and mocks: a nearest-neighbor
//! vector index, a text-generation model, a natural-language-to-SQL agent,
//! and the corpus feed the index is built from.

pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for collaborator operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Nearest-neighbor search over a text corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and index the corpus. Replaces any previous index contents.
    async fn build(&self, corpus: &[String]) -> Result<(), ProviderError>;

    /// Return the `top_k` closest passages as (text, distance) pairs,
    /// closest first.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<Vec<(String, f32)>, ProviderError>;
}

/// Text-completion model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate an answer for the prompt, optionally grounded in the given
    /// context passages.
    async fn generate(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> Result<String, ProviderError>;
}

/// Natural-language-to-SQL agent. `run` is blocking and must be executed off
/// the async scheduler.
pub trait SqlAgent: Send + Sync {
    fn run(&self, question: &str) -> Result<String, ProviderError>;
}

/// Source of the domain text corpus the vector index is built from.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<String>, ProviderError>;
}
