//! Structured-query answering through the natural-language-to-SQL agent.

use crate::error::ChatError;
use crate::services::providers::{ProviderError, SqlAgent};
use std::sync::Arc;

/// Wraps the blocking SQL agent so its calls run on the blocking worker pool
/// instead of the async scheduler.
pub struct SqlAgentService {
    agent: Arc<dyn SqlAgent>,
}

impl SqlAgentService {
    pub fn new(agent: Arc<dyn SqlAgent>) -> Self {
        Self { agent }
    }

    /// Answer a question from the database. Agent failures propagate as
    /// collaborator errors for the orchestrator to handle.
    pub async fn answer(&self, question: &str) -> Result<String, ChatError> {
        let agent = Arc::clone(&self.agent);
        let question = question.to_string();

        let result = tokio::task::spawn_blocking(move || agent.run(&question))
            .await
            .map_err(|e| {
                ChatError::Collaborator(ProviderError::ApiError(format!(
                    "SQL agent task failed: {}",
                    e
                )))
            })?;

        result.map_err(ChatError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockSqlAgent;

    #[tokio::test]
    async fn test_agent_answer_is_returned() {
        let service = SqlAgentService::new(Arc::new(MockSqlAgent::new("There are 77 products.")));
        let answer = service.answer("How many products?").await.unwrap();
        assert_eq!(answer, "There are 77 products.");
    }

    #[tokio::test]
    async fn test_agent_failure_propagates() {
        let service = SqlAgentService::new(Arc::new(MockSqlAgent::failing()));
        let err = service.answer("How many products?").await.unwrap_err();
        assert!(matches!(err, ChatError::Collaborator(_)));
    }
}
