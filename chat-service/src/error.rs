//! Error taxonomy for the conversational service.

use crate::services::providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A collaborator has not been initialized yet.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A retrieval, generation, or SQL-agent call failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] ProviderError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid interaction index {index}: session has {len} interactions")]
    InvalidFeedbackIndex { index: usize, len: usize },

    #[error("Validation error: {0}")]
    Validation(String),
}
