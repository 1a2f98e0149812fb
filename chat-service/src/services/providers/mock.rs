//! Mock provider implementations for testing.

use super::{CorpusSource, ProviderError, SqlAgent, TextGenerator, VectorIndex};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;

/// Mock vector index ranking passages by shared-token count with the query.
#[derive(Default)]
pub struct MockVectorIndex {
    docs: RwLock<Vec<String>>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn build(&self, corpus: &[String]) -> Result<(), ProviderError> {
        *self.docs.write().await = corpus.to_vec();
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, ProviderError> {
        let docs = self.docs.read().await;
        if docs.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Mock index not built".to_string(),
            ));
        }

        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();

        let mut scored: Vec<(String, f32)> = docs
            .iter()
            .map(|doc| {
                let doc_lower = doc.to_lowercase();
                let overlap = tokens
                    .iter()
                    .filter(|token| doc_lower.contains(*token))
                    .count();
                // Lower distance means closer.
                (doc.clone(), 1.0 / (overlap as f32 + 1.0))
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Mock text generator with configurable reply, delay, and failure.
#[derive(Default)]
pub struct MockTextGenerator {
    reply: Option<String>,
    delay: Duration,
    fail: bool,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> Result<String, ProviderError> {
        if self.fail {
            return Err(ProviderError::ApiError(
                "Mock generator failure".to_string(),
            ));
        }

        tokio::time::sleep(self.delay).await;

        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }

        Ok(match context {
            Some(docs) if !docs.is_empty() => format!(
                "Mock response for: {} (using {} context passages)",
                prompt,
                docs.len()
            ),
            _ => format!("Mock response for: {}", prompt),
        })
    }
}

/// Mock SQL agent with configurable answer, blocking delay, and failure.
pub struct MockSqlAgent {
    answer: String,
    delay: Duration,
    fail: bool,
}

impl MockSqlAgent {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: String::new(),
            delay: Duration::ZERO,
            fail: true,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl SqlAgent for MockSqlAgent {
    fn run(&self, _question: &str) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(ProviderError::ApiError("Mock SQL agent failure".to_string()));
        }
        Ok(self.answer.clone())
    }
}

/// Mock corpus source serving a fixed document list.
pub struct MockCorpusSource {
    docs: Vec<String>,
    fail: bool,
}

impl MockCorpusSource {
    pub fn new(docs: Vec<String>) -> Self {
        Self { docs, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            docs: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl CorpusSource for MockCorpusSource {
    async fn fetch(&self) -> Result<Vec<String>, ProviderError> {
        if self.fail {
            return Err(ProviderError::ApiError(
                "Mock corpus source failure".to_string(),
            ));
        }
        Ok(self.docs.clone())
    }
}
