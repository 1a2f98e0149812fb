//! Conversational orchestration.
//!
//! The top-level entry point: resolves the session, classifies the question,
//! dispatches to the retrieval and/or SQL strategies, enriches the result with
//! conversational context, and records the interaction.

use crate::error::ChatError;
use crate::models::response::{
    ConversationalResponse, GlobalStatistics, QueryStats, SessionHistory, SessionStatistics,
    StrategyUsed, UserPreferences,
};
use crate::models::session::{EntityCategory, Interaction, InteractionMetadata, Session};
use crate::routing::{self, QueryAnalysis, QueryStrategy};
use crate::services::retrieval::RetrievalService;
use crate::services::session_store::SessionStore;
use crate::services::sql_agent::SqlAgentService;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default bound on how long hybrid dispatch waits for both strategies.
pub const DEFAULT_HYBRID_TIMEOUT: Duration = Duration::from_secs(30);

/// How many queries pass between periodic session sweeps.
pub const DEFAULT_SWEEP_EVERY: u64 = 10;

/// Words signalling that a question leans on earlier conversation.
const AMBIGUOUS_REFERENCE_WORDS: [&str; 7] = ["it", "that", "this", "them", "they", "also", "more"];

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct ConversationalOptions {
    pub hybrid_timeout: Duration,
    pub sweep_every: u64,
}

impl Default for ConversationalOptions {
    fn default() -> Self {
        Self {
            hybrid_timeout: DEFAULT_HYBRID_TIMEOUT,
            sweep_every: DEFAULT_SWEEP_EVERY,
        }
    }
}

/// What a dispatch arm produced, before response assembly.
struct DispatchOutcome {
    answer: String,
    strategy: StrategyUsed,
    sources: Vec<String>,
    sql_query: Option<String>,
    reasoning_note: Option<&'static str>,
}

/// Session-aware question answering over the retrieval and SQL backends.
pub struct ConversationalService {
    sessions: SessionStore,
    retrieval: RetrievalService,
    sql: SqlAgentService,
    stats: Mutex<QueryStats>,
    options: ConversationalOptions,
}

impl ConversationalService {
    pub fn new(
        sessions: SessionStore,
        retrieval: RetrievalService,
        sql: SqlAgentService,
        options: ConversationalOptions,
    ) -> Self {
        Self {
            sessions,
            retrieval,
            sql,
            stats: Mutex::new(QueryStats::default()),
            options,
        }
    }

    /// Answer a question within a conversation.
    ///
    /// Resolves (or mints) the session, routes the question, and returns the
    /// enriched response. Processing failures surface as a degraded response
    /// with confidence 0.0, never as an error; only an empty question is
    /// rejected outright.
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
        _preferences: Option<&UserPreferences>,
    ) -> Result<ConversationalResponse, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::Validation("Question cannot be empty".to_string()));
        }

        let (session_id, session) = self.sessions.get_or_create(session_id).await;
        let conversation_summary = session.conversation_summary(3);

        // Periodic cleanup of idle sessions, every Nth query overall.
        let total_so_far = self.stats.lock().await.total_queries;
        if total_so_far % self.options.sweep_every == 0 {
            self.sessions.sweep().await;
        }

        match self
            .process(question, &session_id, &session, &conversation_summary)
            .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!(error = %e, session_id = %session_id, "Error while processing question");
                Ok(ConversationalResponse {
                    answer: format!(
                        "I encountered an error while processing your question: {}. \
                         Could you please rephrase your question?",
                        e
                    ),
                    confidence: 0.0,
                    query_type_used: StrategyUsed::Error,
                    session_id,
                    reasoning: "Error occurred during processing".to_string(),
                    sources: Vec::new(),
                    sql_query: None,
                    suggested_followups: Vec::new(),
                    clarification_needed: None,
                    conversation_summary,
                    timestamp: Utc::now(),
                })
            }
        }
    }

    /// Classify, dispatch, enrich, record.
    async fn process(
        &self,
        question: &str,
        session_id: &str,
        session: &Session,
        conversation_summary: &str,
    ) -> Result<ConversationalResponse, ChatError> {
        let analysis = routing::analyze_query(question, Some(&session.context));
        tracing::info!(
            strategy = analysis.strategy.as_str(),
            confidence = analysis.confidence,
            "Classified question"
        );

        let outcome = match analysis.strategy {
            QueryStrategy::Clarification => {
                self.stats.lock().await.clarification_requests += 1;
                // The conversation is not advanced until the user resolves
                // the ambiguity; nothing is recorded.
                return Ok(ConversationalResponse {
                    answer: clarification_answer(&analysis, session),
                    confidence: analysis.confidence,
                    query_type_used: StrategyUsed::Clarification,
                    session_id: session_id.to_string(),
                    reasoning: analysis.reasoning.clone(),
                    sources: Vec::new(),
                    sql_query: None,
                    suggested_followups: analysis.suggested_followups.clone(),
                    clarification_needed: analysis.clarification_needed.clone(),
                    conversation_summary: conversation_summary.to_string(),
                    timestamp: Utc::now(),
                });
            }
            QueryStrategy::Rag => self.dispatch_rag(question, session, &analysis).await?,
            QueryStrategy::Sql => self.dispatch_sql(question, session, &analysis).await?,
            QueryStrategy::Hybrid => self.dispatch_hybrid(question).await?,
        };

        let metadata = InteractionMetadata {
            confidence: analysis.confidence,
            sources: outcome.sources.clone(),
            sql_query: outcome.sql_query.clone(),
            entities: analysis.entities.clone(),
            feedback: None,
        };
        self.sessions
            .add_interaction(session_id, question, &outcome.answer, outcome.strategy, metadata)
            .await;

        self.stats.lock().await.total_queries += 1;

        let mut reasoning = analysis.reasoning.clone();
        if let Some(note) = outcome.reasoning_note {
            reasoning.push_str(note);
        }

        Ok(ConversationalResponse {
            answer: outcome.answer,
            confidence: analysis.confidence,
            query_type_used: outcome.strategy,
            session_id: session_id.to_string(),
            reasoning,
            sources: outcome.sources,
            sql_query: outcome.sql_query,
            suggested_followups: analysis.suggested_followups,
            clarification_needed: None,
            conversation_summary: conversation_summary.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Vector search plus contextual reasoning.
    async fn dispatch_rag(
        &self,
        question: &str,
        session: &Session,
        analysis: &QueryAnalysis,
    ) -> Result<DispatchOutcome, ChatError> {
        let enhanced = enhance_question_with_context(question, session);
        let retrieved = self.retrieval.answer_question(&enhanced).await?;
        let answer = improve_rag_answer(&retrieved.answer, session, &analysis.entities);

        self.stats.lock().await.rag_queries += 1;

        Ok(DispatchOutcome {
            answer,
            strategy: StrategyUsed::Rag,
            sources: vec!["Vector search results".to_string()],
            sql_query: None,
            reasoning_note: None,
        })
    }

    /// Specific data straight from the database.
    async fn dispatch_sql(
        &self,
        question: &str,
        session: &Session,
        analysis: &QueryAnalysis,
    ) -> Result<DispatchOutcome, ChatError> {
        let enhanced = enhance_question_with_context(question, session);
        let sql_answer = self.sql.answer(&enhanced).await?;
        let answer = improve_sql_answer(&sql_answer, &analysis.entities);

        self.stats.lock().await.sql_queries += 1;

        Ok(DispatchOutcome {
            answer,
            strategy: StrategyUsed::Sql,
            sources: vec!["Database query".to_string()],
            // The agent executes its own queries; the text is not recoverable.
            sql_query: Some("SQL query executed".to_string()),
            reasoning_note: None,
        })
    }

    /// Both strategies concurrently against the original question, joined
    /// under a shared deadline. The slower branch is discarded on timeout and
    /// retrieval alone answers.
    async fn dispatch_hybrid(&self, question: &str) -> Result<DispatchOutcome, ChatError> {
        let rag_fut = self.retrieval.answer_question(question);
        let sql_fut = self.sql.answer(question);

        match tokio::time::timeout(
            self.options.hybrid_timeout,
            futures::future::join(rag_fut, sql_fut),
        )
        .await
        {
            Ok((rag_result, sql_result)) => {
                let retrieved = rag_result?;
                let sql_answer = sql_result?;
                let answer = combine_results(&retrieved.answer, &sql_answer);

                self.stats.lock().await.hybrid_queries += 1;

                Ok(DispatchOutcome {
                    answer,
                    strategy: StrategyUsed::Hybrid,
                    sources: vec!["Vector search".to_string(), "Database query".to_string()],
                    sql_query: Some("SQL query executed".to_string()),
                    reasoning_note: None,
                })
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.options.hybrid_timeout.as_secs(),
                    "Hybrid dispatch timed out, falling back to retrieval"
                );
                let retrieved = self.retrieval.answer_question(question).await?;

                Ok(DispatchOutcome {
                    answer: retrieved.answer,
                    strategy: StrategyUsed::RagFallback,
                    sources: vec!["Vector search (fallback)".to_string()],
                    sql_query: None,
                    reasoning_note: Some(" (Timeout occurred, used RAG fallback)"),
                })
            }
        }
    }

    /// Statistics and summary for a single session.
    pub async fn session_statistics(
        &self,
        session_id: &str,
    ) -> Result<SessionStatistics, ChatError> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        Ok(SessionStatistics {
            session_id: session.session_id.clone(),
            created_at: session.created_at,
            last_activity: session.last_activity,
            total_interactions: session.history.len(),
            conversation_summary: session.conversation_summary(3),
            current_context: session.context,
        })
    }

    /// Overall system statistics.
    pub async fn global_statistics(&self) -> GlobalStatistics {
        GlobalStatistics {
            active_sessions: self.sessions.active_count().await,
            query_statistics: self.stats.lock().await.clone(),
            system_status: "operational".to_string(),
        }
    }

    /// The last `limit` recorded interactions of a session (all when 0).
    pub async fn session_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<SessionHistory, ChatError> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let total = session.history.len();
        let start = if limit == 0 {
            0
        } else {
            total.saturating_sub(limit)
        };
        let history: Vec<Interaction> = session.history[start..].to_vec();

        Ok(SessionHistory {
            session_id: session.session_id.clone(),
            total_interactions: total,
            returned_interactions: history.len(),
            history,
        })
    }

    /// Manually end a conversation session.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ChatError> {
        self.sessions.end_session(session_id).await
    }

    /// Attach a rating and optional comment to a recorded interaction.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        interaction_index: usize,
        rating: u8,
        comment: Option<String>,
    ) -> Result<(), ChatError> {
        if !(1..=5).contains(&rating) {
            return Err(ChatError::Validation(format!(
                "Rating must be between 1 and 5, got {}",
                rating
            )));
        }

        self.sessions
            .record_feedback(session_id, interaction_index, rating, comment)
            .await?;

        tracing::info!(session_id, interaction_index, rating, "Feedback recorded");
        Ok(())
    }
}

/// Prepend a two-turn conversation summary when the question leans on earlier
/// context.
fn enhance_question_with_context(question: &str, session: &Session) -> String {
    if session.history.is_empty() {
        return question.to_string();
    }

    let question_lower = question.to_lowercase();
    if AMBIGUOUS_REFERENCE_WORDS
        .iter()
        .any(|w| question_lower.contains(w))
    {
        let recent = session.conversation_summary(2);
        return format!(
            "Previous conversation:\n{}\n\nCurrent question: {}",
            recent, question
        );
    }

    question.to_string()
}

/// Add conversational continuity and entity background to a retrieval answer.
fn improve_rag_answer(answer: &str, session: &Session, entities: &[EntityCategory]) -> String {
    let mut improved = if session.history.is_empty() {
        answer.to_string()
    } else {
        format!(
            "Building on our previous discussion, {}",
            answer.to_lowercase()
        )
    };

    let blurbs: Vec<&str> = entities
        .iter()
        .filter_map(|entity| entity_context(*entity))
        .collect();
    if !blurbs.is_empty() {
        improved.push_str("\n\n");
        improved.push_str(&blurbs.join(" "));
    }

    improved
}

/// Add interpretation and related-query suggestions to a SQL answer.
fn improve_sql_answer(answer: &str, entities: &[EntityCategory]) -> String {
    let mut improved = answer.to_string();

    if answer.chars().any(|c| c.is_ascii_digit()) {
        improved.push_str(
            "\n\nLet me know if you'd like me to break down these numbers or explore related data!",
        );
    }

    let suggestions: Vec<&str> = entities
        .iter()
        .flat_map(|entity| related_query_suggestions(*entity).iter().copied())
        .take(3)
        .collect();
    if !suggestions.is_empty() {
        improved.push_str(&format!(
            "\n\nYou might also be interested in: {}",
            suggestions.join(", ")
        ));
    }

    improved
}

/// Merge the retrieval and SQL answers; specific data leads when the database
/// found any.
fn combine_results(rag_answer: &str, sql_answer: &str) -> String {
    if sql_answer.chars().any(|c| c.is_ascii_digit()) {
        return format!(
            "Based on the database query: {}\n\nFor additional context: {}",
            sql_answer, rag_answer
        );
    }

    let mut combined = format!("{}\n\n", rag_answer);
    if !sql_answer.is_empty() {
        combined.push_str(&format!("From the database: {}", sql_answer));
    }
    combined
}

/// Build the clarification answer, reminding the user of recently discussed
/// topics when there are any.
fn clarification_answer(analysis: &QueryAnalysis, session: &Session) -> String {
    let mut clarification = analysis
        .clarification_needed
        .clone()
        .unwrap_or_else(|| {
            "Could you provide more details about what you're looking for?".to_string()
        });

    let start = session.history.len().saturating_sub(2);
    let mut recent_topics: Vec<EntityCategory> = Vec::new();
    for interaction in &session.history[start..] {
        for entity in &interaction.metadata.entities {
            if !recent_topics.contains(entity) {
                recent_topics.push(*entity);
            }
        }
    }

    if !recent_topics.is_empty() {
        let names: Vec<&str> = recent_topics.iter().map(|e| e.as_str()).collect();
        clarification.push_str(&format!(
            "\n\nWe were recently discussing: {}",
            names.join(", ")
        ));
    }

    clarification
}

/// Background blurb appended to retrieval answers touching an entity.
fn entity_context(entity: EntityCategory) -> Option<&'static str> {
    match entity {
        EntityCategory::Products => Some(
            "This database contains product information including categories, suppliers, and pricing.",
        ),
        EntityCategory::Customers => Some(
            "Customer data includes company information, contacts, and geographic details.",
        ),
        EntityCategory::Orders => Some(
            "Order information includes purchase details, dates, and customer relationships.",
        ),
        EntityCategory::Employees => Some(
            "Employee data covers staff information, territories, and reporting relationships.",
        ),
        EntityCategory::Regions => None,
    }
}

/// Related-query suggestions appended to SQL answers touching an entity.
fn related_query_suggestions(entity: EntityCategory) -> &'static [&'static str] {
    match entity {
        EntityCategory::Products => &["product categories", "supplier information", "pricing analysis"],
        EntityCategory::Customers => &["customer regions", "order history", "contact details"],
        EntityCategory::Orders => &["order trends", "delivery information", "sales analysis"],
        EntityCategory::Employees => &["territory assignments", "sales performance", "team structure"],
        EntityCategory::Regions => &[],
    }
}
