//! Retrieval-augmented answering over the vector index.

use crate::error::ChatError;
use crate::services::providers::{CorpusSource, ProviderError, TextGenerator, VectorIndex};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Default number of context passages retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Result of answering a question from retrieved context.
#[derive(Debug, Clone)]
pub struct RetrievalAnswer {
    pub question: String,
    pub answer: String,
    /// Context passages the answer was grounded in, closest first.
    pub context: Vec<String>,
    pub context_count: usize,
}

/// Answers questions by searching the vector index and prompting the text
/// generator with the retrieved passages.
pub struct RetrievalService {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn TextGenerator>,
    corpus: Arc<dyn CorpusSource>,
    top_k: usize,
    /// Corpus size, set once the index has been built.
    initialized: OnceCell<usize>,
}

impl RetrievalService {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn TextGenerator>,
        corpus: Arc<dyn CorpusSource>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            generator,
            corpus,
            top_k,
            initialized: OnceCell::new(),
        }
    }

    /// Build the index from the corpus feed. Runs at most once per process;
    /// concurrent callers wait for the single build. A failed build leaves
    /// the service uninitialized and is retried on the next call.
    async fn ensure_initialized(&self) -> Result<(), ChatError> {
        let doc_count = *self
            .initialized
            .get_or_try_init(|| async {
                tracing::info!("Building vector index");
                let docs = self.corpus.fetch().await?;
                self.index.build(&docs).await?;
                Ok::<usize, ProviderError>(docs.len())
            })
            .await
            .map_err(|e| ChatError::ServiceUnavailable(e.to_string()))?;

        tracing::debug!(doc_count, "Vector index ready");
        Ok(())
    }

    /// Retrieve the closest context passages for a query.
    async fn search_context(&self, query: &str) -> Result<Vec<String>, ChatError> {
        self.ensure_initialized().await?;
        let results = self.index.search(query, self.top_k).await?;
        Ok(results.into_iter().map(|(text, _distance)| text).collect())
    }

    /// Answer a question from retrieved context.
    ///
    /// Generation failures are rendered into the answer text rather than
    /// propagated; retrieval always answers something.
    pub async fn answer_question(&self, question: &str) -> Result<RetrievalAnswer, ChatError> {
        let context = self.search_context(question).await?;

        let answer = match self.generator.generate(question, Some(&context)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Text generation failed");
                format!("Error generating answer: {}", e)
            }
        };

        Ok(RetrievalAnswer {
            question: question.to_string(),
            answer,
            context_count: context.len(),
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::{
        MockCorpusSource, MockTextGenerator, MockVectorIndex,
    };

    fn service_with_generator(generator: MockTextGenerator) -> RetrievalService {
        let corpus = vec![
            "Chai: 10 boxes x 20 bags".to_string(),
            "Chang: 24 - 12 oz bottles".to_string(),
            "Aniseed Syrup: 12 - 550 ml bottles".to_string(),
            "Our return policy allows returns within 30 days.".to_string(),
        ];
        RetrievalService::new(
            Arc::new(MockVectorIndex::new()),
            Arc::new(generator),
            Arc::new(MockCorpusSource::new(corpus)),
            DEFAULT_TOP_K,
        )
    }

    #[tokio::test]
    async fn test_answer_includes_retrieved_context() {
        let service = service_with_generator(MockTextGenerator::new());
        let result = service
            .answer_question("what is the return policy")
            .await
            .unwrap();

        assert_eq!(result.context_count, DEFAULT_TOP_K);
        assert!(result.context[0].contains("return policy"));
        assert!(result.answer.contains("3 context passages"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_rendered_not_raised() {
        let service = service_with_generator(MockTextGenerator::failing());
        let result = service.answer_question("anything").await.unwrap();

        assert!(result.answer.starts_with("Error generating answer:"));
        assert_eq!(result.context_count, DEFAULT_TOP_K);
    }

    #[tokio::test]
    async fn test_corpus_failure_means_service_unavailable() {
        let service = RetrievalService::new(
            Arc::new(MockVectorIndex::new()),
            Arc::new(MockTextGenerator::new()),
            Arc::new(MockCorpusSource::failing()),
            DEFAULT_TOP_K,
        );

        let err = service.answer_question("anything").await.unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_index_builds_once() {
        let service = service_with_generator(MockTextGenerator::new());
        service.answer_question("first").await.unwrap();
        service.answer_question("second").await.unwrap();
        assert_eq!(service.initialized.get(), Some(&4));
    }
}
