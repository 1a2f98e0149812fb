//! Response and statistics types returned to the application layer.

use crate::models::session::{Interaction, SessionContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing path recorded on a response or interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyUsed {
    Rag,
    Sql,
    Hybrid,
    Clarification,
    RagFallback,
    Error,
}

impl StrategyUsed {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyUsed::Rag => "RAG",
            StrategyUsed::Sql => "SQL",
            StrategyUsed::Hybrid => "HYBRID",
            StrategyUsed::Clarification => "CLARIFICATION",
            StrategyUsed::RagFallback => "RAG_FALLBACK",
            StrategyUsed::Error => "ERROR",
        }
    }
}

impl fmt::Display for StrategyUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied hints about response style. Currently accepted for API
/// compatibility and not used to alter responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<String>,
}

/// A complete response from the conversational service: the answer plus the
/// routing explanation, provenance, and follow-up suggestions.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationalResponse {
    pub answer: String,

    /// Confidence score in [0, 1]; 0.0 on full failure.
    pub confidence: f32,

    pub query_type_used: StrategyUsed,

    pub session_id: String,

    /// Why this processing path was chosen.
    pub reasoning: String,

    pub sources: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,

    pub suggested_followups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_needed: Option<String>,

    /// Summary of the conversation as it stood when the question arrived.
    pub conversation_summary: String,

    pub timestamp: DateTime<Utc>,
}

/// Per-strategy query counters, process-wide.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryStats {
    pub total_queries: u64,
    pub rag_queries: u64,
    pub sql_queries: u64,
    pub hybrid_queries: u64,
    pub clarification_requests: u64,
}

/// Statistics for a single session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatistics {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub total_interactions: usize,
    pub current_context: SessionContext,
    pub conversation_summary: String,
}

/// Overall system statistics.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStatistics {
    pub active_sessions: usize,
    pub query_statistics: QueryStats,
    pub system_status: String,
}

/// A slice of a session's recorded interactions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub total_interactions: usize,
    pub returned_interactions: usize,
    pub history: Vec<Interaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_serializes_to_wire_labels() {
        for (strategy, label) in [
            (StrategyUsed::Rag, "\"RAG\""),
            (StrategyUsed::Sql, "\"SQL\""),
            (StrategyUsed::Hybrid, "\"HYBRID\""),
            (StrategyUsed::Clarification, "\"CLARIFICATION\""),
            (StrategyUsed::RagFallback, "\"RAG_FALLBACK\""),
            (StrategyUsed::Error, "\"ERROR\""),
        ] {
            assert_eq!(serde_json::to_string(&strategy).unwrap(), label);
        }
    }

    #[test]
    fn test_response_serializes_without_empty_optionals() {
        let response = ConversationalResponse {
            answer: "There are 77 products.".to_string(),
            confidence: 0.72,
            query_type_used: StrategyUsed::Sql,
            session_id: "s1".to_string(),
            reasoning: "Question appears to request specific data".to_string(),
            sources: vec!["Database query".to_string()],
            sql_query: None,
            suggested_followups: Vec::new(),
            clarification_needed: None,
            conversation_summary: "No previous conversation.".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["query_type_used"], "SQL");
        assert!(json.get("sql_query").is_none());
        assert!(json.get("clarification_needed").is_none());
    }
}
