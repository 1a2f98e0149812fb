//! Query classification and routing.
//!
//! Scores each question against lexical indicator vocabularies to decide
//! between retrieval, SQL, hybrid, or clarification processing. The routing is
//! deterministic keyword analysis; no ML model involved.

use crate::models::response::StrategyUsed;
use crate::models::session::{EntityCategory, SessionContext};
use serde::Serialize;

/// Processing strategy chosen by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStrategy {
    /// Vector search with LLM reasoning.
    Rag,
    /// Direct database queries through the SQL agent.
    Sql,
    /// Both approaches combined.
    Hybrid,
    /// More information needed from the user.
    Clarification,
}

impl QueryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStrategy::Rag => "RAG",
            QueryStrategy::Sql => "SQL",
            QueryStrategy::Hybrid => "HYBRID",
            QueryStrategy::Clarification => "CLARIFICATION",
        }
    }
}

/// Result of classifying a single question. Transient; not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub question: String,
    pub strategy: QueryStrategy,
    /// Confidence in the routing decision, in [0, 1].
    pub confidence: f32,
    /// Why this route was chosen.
    pub reasoning: String,
    /// Entity categories detected in the question.
    pub entities: Vec<EntityCategory>,
    /// Clarification prompt, when the question is too ambiguous to route.
    pub clarification_needed: Option<String>,
    /// Up to 3 suggested follow-up questions.
    pub suggested_followups: Vec<String>,
}

/// Indicators of questions that want specific data out of the database.
const SQL_INDICATORS: &[&str] = &[
    // Counting
    "how many", "count", "total", "number of", "sum", "average", "max", "min",
    // Filtering
    "where", "filter", "specific", "exactly", "precise", "show me all",
    // Comparison
    "compare", "difference", "versus", "vs", "between", "greater than", "less than",
    // Enumeration
    "list all", "show all", "find all", "get all", "top", "bottom", "highest", "lowest",
];

/// Indicators of conceptual questions best served by retrieval.
const RAG_INDICATORS: &[&str] = &[
    // Conceptual
    "what is", "explain", "describe", "tell me about", "how does", "why",
    // General information
    "information about", "details about", "overview", "summary", "background",
    // Advice/recommendation
    "recommend", "suggest", "advice", "should i", "best", "better", "ideal",
];

/// Pronouns without a clear antecedent.
const AMBIGUOUS_PRONOUNS: [&str; 6] = ["it", "that", "this", "them", "those", "these"];

/// Words that mark a question as continuing the previous one.
const FOLLOWUP_WORDS: [&str; 5] = ["also", "and", "more", "additionally", "furthermore"];

/// Analyze a question and determine the best processing strategy.
///
/// Pure function of the question text and the supplied session context;
/// classifying the same inputs twice yields the same analysis.
pub fn analyze_query(question: &str, context: Option<&SessionContext>) -> QueryAnalysis {
    let lowered = question.to_lowercase();
    let lowered = lowered.trim();
    let clean = normalize(lowered);

    let entities = detect_entities(&clean);

    // Ambiguous references without an established topic short-circuit into a
    // clarification request; no scoring happens.
    if needs_clarification(lowered, context) {
        return QueryAnalysis {
            question: question.to_string(),
            strategy: QueryStrategy::Clarification,
            confidence: 0.8,
            reasoning: "Question contains ambiguous references that need clarification"
                .to_string(),
            entities,
            clarification_needed: Some(clarification_prompt(lowered).to_string()),
            suggested_followups: Vec::new(),
        };
    }

    let mut sql_score = structured_score(&clean);
    let mut rag_score = retrieval_score(&clean);

    if let Some(ctx) = context {
        (sql_score, rag_score) = adjust_scores_with_context(sql_score, rag_score, ctx, &clean);
    }

    let (strategy, confidence, reasoning) = if clean.is_empty() {
        // Degenerate input: no signal at all, fall through to the safe default.
        (
            QueryStrategy::Rag,
            0.5,
            "Unclear intent, defaulting to contextual search".to_string(),
        )
    } else if sql_score > rag_score && sql_score > 0.6 {
        (
            QueryStrategy::Sql,
            sql_score.min(0.95),
            format!(
                "Question appears to request specific data (SQL score: {:.2})",
                sql_score
            ),
        )
    } else if rag_score > 0.7 {
        (
            QueryStrategy::Rag,
            rag_score.min(0.95),
            format!(
                "Question appears conceptual or needs context (RAG score: {:.2})",
                rag_score
            ),
        )
    } else if (sql_score - rag_score).abs() < 0.2 {
        (
            QueryStrategy::Hybrid,
            0.7,
            "Question could benefit from both data retrieval and contextual reasoning"
                .to_string(),
        )
    } else {
        (
            QueryStrategy::Rag,
            0.5,
            "Unclear intent, defaulting to contextual search".to_string(),
        )
    };

    let suggested_followups = suggested_followups(&entities, strategy);

    QueryAnalysis {
        question: question.to_string(),
        strategy,
        confidence,
        reasoning,
        entities,
        clarification_needed: None,
        suggested_followups,
    }
}

/// Lowercase input with punctuation collapsed to whitespace and whitespace
/// runs collapsed to single spaces.
fn normalize(question: &str) -> String {
    let replaced: String = question
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Detect which entity categories the question refers to.
fn detect_entities(question: &str) -> Vec<EntityCategory> {
    EntityCategory::ALL
        .into_iter()
        .filter(|category| category.keywords().iter().any(|kw| question.contains(kw)))
        .collect()
}

fn needs_clarification(question: &str, context: Option<&SessionContext>) -> bool {
    if context.is_some_and(|ctx| ctx.topic.is_some()) {
        return false;
    }
    AMBIGUOUS_PRONOUNS
        .iter()
        .any(|p| question.starts_with(p) || question.contains(&format!(" {} ", p)))
}

fn clarification_prompt(question: &str) -> &'static str {
    if ["it", "that", "this"].iter().any(|p| question.starts_with(p)) {
        "I'm not sure what you're referring to. Could you be more specific about what you'd like to know?"
    } else if ["them", "those", "these"].iter().any(|p| question.starts_with(p)) {
        "Which items are you asking about? Could you clarify what you'd like to know more about?"
    } else {
        "Could you provide more details about what you're looking for?"
    }
}

/// How likely the question needs SQL processing, in [0, 1].
fn structured_score(question: &str) -> f32 {
    let mut score = 0.0f32;
    let mut matches = 0u32;

    for indicator in SQL_INDICATORS {
        if question.contains(indicator) {
            matches += 1;
            score += match *indicator {
                "how many" | "count" | "total" => 0.3,
                "list all" | "show all" | "get all" => 0.25,
                _ => 0.2,
            };
        }
    }

    if matches > 1 {
        score *= 1.2;
    }

    // Standalone numbers usually mean counts or thresholds.
    if question
        .split_whitespace()
        .any(|token| token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty())
    {
        score += 0.1;
    }

    for word in ["which", "where", "when", "who"] {
        if question.starts_with(word) {
            score += 0.15;
        }
    }

    score.min(1.0)
}

/// How likely the question needs retrieval processing, in [0, 1].
fn retrieval_score(question: &str) -> f32 {
    let mut score = 0.0f32;
    let mut matches = 0u32;

    for indicator in RAG_INDICATORS {
        if question.contains(indicator) {
            matches += 1;
            score += match *indicator {
                "what is" | "explain" | "describe" => 0.3,
                "tell me about" | "information about" => 0.25,
                _ => 0.2,
            };
        }
    }

    if matches > 1 {
        score *= 1.2;
    }

    for word in ["what", "how", "why"] {
        if question.starts_with(word) {
            score += 0.2;
        }
    }

    // Long questions often need more context.
    if question.split_whitespace().count() > 10 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Bias scores toward the strategy used for the previous interaction. A
/// continuation word strengthens the bias; the stronger multiplier replaces
/// the base one rather than compounding.
fn adjust_scores_with_context(
    sql_score: f32,
    rag_score: f32,
    context: &SessionContext,
    question: &str,
) -> (f32, f32) {
    let is_followup = FOLLOWUP_WORDS.iter().any(|w| question.contains(w));
    let boost = if is_followup { 1.2 } else { 1.1 };

    match context.last_strategy {
        Some(StrategyUsed::Sql) => (sql_score * boost, rag_score),
        Some(StrategyUsed::Rag) => (sql_score, rag_score * boost),
        _ => (sql_score, rag_score),
    }
}

/// Suggested follow-up questions for the detected entities, capped at 3.
fn suggested_followups(entities: &[EntityCategory], strategy: QueryStrategy) -> Vec<String> {
    let mut followups: Vec<&str> = Vec::new();

    if entities.contains(&EntityCategory::Products) {
        if strategy == QueryStrategy::Sql {
            followups.extend([
                "Would you like to see the top-selling products?",
                "Are you interested in products from a specific category?",
                "Do you want to compare products by price or popularity?",
            ]);
        } else {
            followups.extend([
                "Would you like to know more about product categories?",
                "Are you interested in learning about suppliers?",
                "Do you want to understand how products are organized?",
            ]);
        }
    }

    if entities.contains(&EntityCategory::Customers) {
        if strategy == QueryStrategy::Sql {
            followups.extend([
                "Would you like to see customer order statistics?",
                "Are you interested in customers from specific regions?",
                "Do you want to analyze customer purchasing patterns?",
            ]);
        } else {
            followups.extend([
                "Would you like to understand customer demographics?",
                "Are you interested in customer relationship management?",
                "Do you want to learn about customer segmentation?",
            ]);
        }
    }

    followups.truncate(3);
    followups.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_keywords_route_to_sql() {
        let analysis = analyze_query("How many orders did we receive in total?", None);
        assert_eq!(analysis.strategy, QueryStrategy::Sql);
        assert!(analysis.confidence >= 0.6);
        assert_eq!(analysis.entities, vec![EntityCategory::Orders]);
    }

    #[test]
    fn test_what_is_routes_to_retrieval() {
        let analysis = analyze_query("What is our return policy?", None);
        assert_eq!(analysis.strategy, QueryStrategy::Rag);
    }

    #[test]
    fn test_strong_conceptual_question_scores_high() {
        let analysis = analyze_query(
            "What is the best way to explain our product catalog to customers?",
            None,
        );
        assert_eq!(analysis.strategy, QueryStrategy::Rag);
        assert!(analysis.confidence >= 0.7);
    }

    #[test]
    fn test_close_scores_route_to_hybrid() {
        let analysis = analyze_query("How many products do we have?", None);
        assert_eq!(analysis.strategy, QueryStrategy::Hybrid);
        assert!((analysis.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_comparison_keywords_overlap() {
        // "versus" also contains "vs", so both indicators match.
        let analysis = analyze_query("Compare sales versus last year", None);
        assert_eq!(analysis.strategy, QueryStrategy::Sql);
        assert!(analysis.confidence >= 0.6);
    }

    #[test]
    fn test_number_bonus() {
        let analysis = analyze_query("Count the top 3 total products", None);
        assert_eq!(analysis.strategy, QueryStrategy::Sql);
        assert!((analysis.confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let context = SessionContext {
            last_strategy: Some(StrategyUsed::Sql),
            ..Default::default()
        };
        let first = analyze_query("How many customers are in Germany?", Some(&context));
        let second = analyze_query("How many customers are in Germany?", Some(&context));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_question_defaults_to_retrieval() {
        let analysis = analyze_query("", None);
        assert_eq!(analysis.strategy, QueryStrategy::Rag);
        assert!((analysis.confidence - 0.5).abs() < f32::EPSILON);
        assert!(analysis.entities.is_empty());
        assert!(analysis.suggested_followups.is_empty());
    }

    #[test]
    fn test_pronoun_without_topic_needs_clarification() {
        let analysis = analyze_query("it", None);
        assert_eq!(analysis.strategy, QueryStrategy::Clarification);
        assert!((analysis.confidence - 0.8).abs() < f32::EPSILON);
        assert!(analysis
            .clarification_needed
            .as_deref()
            .unwrap()
            .starts_with("I'm not sure what you're referring to"));
    }

    #[test]
    fn test_plural_pronoun_gets_item_clarification() {
        let analysis = analyze_query("them please", None);
        assert_eq!(analysis.strategy, QueryStrategy::Clarification);
        assert!(analysis
            .clarification_needed
            .as_deref()
            .unwrap()
            .starts_with("Which items are you asking about?"));
    }

    #[test]
    fn test_pronoun_with_topic_is_routed_normally() {
        let context = SessionContext {
            topic: Some(EntityCategory::Products),
            ..Default::default()
        };
        let analysis = analyze_query("it seems interesting, tell me more", Some(&context));
        assert_ne!(analysis.strategy, QueryStrategy::Clarification);
    }

    #[test]
    fn test_context_biases_toward_last_strategy() {
        let baseline = analyze_query("Count the total orders", None);
        assert!((baseline.confidence - 0.72).abs() < 1e-6);

        let context = SessionContext {
            last_strategy: Some(StrategyUsed::Sql),
            ..Default::default()
        };
        let biased = analyze_query("Count the total orders", Some(&context));
        assert_eq!(biased.strategy, QueryStrategy::Sql);
        assert!((biased.confidence - 0.792).abs() < 1e-4);
    }

    #[test]
    fn test_continuation_word_overrides_base_bias() {
        let context = SessionContext {
            last_strategy: Some(StrategyUsed::Sql),
            ..Default::default()
        };
        let analysis = analyze_query("Count the total orders also", Some(&context));
        assert_eq!(analysis.strategy, QueryStrategy::Sql);
        // 0.72 * 1.2, not 0.72 * 1.1 * 1.2
        assert!((analysis.confidence - 0.864).abs() < 1e-4);
    }

    #[test]
    fn test_sql_followups_for_products() {
        let analysis = analyze_query("How many products do we have in total?", None);
        assert_eq!(analysis.strategy, QueryStrategy::Sql);
        assert_eq!(
            analysis.suggested_followups,
            vec![
                "Would you like to see the top-selling products?",
                "Are you interested in products from a specific category?",
                "Do you want to compare products by price or popularity?",
            ]
        );
    }

    #[test]
    fn test_followups_capped_at_three() {
        let analysis = analyze_query("List all products for our total customer count", None);
        assert!(analysis.entities.contains(&EntityCategory::Products));
        assert!(analysis.entities.contains(&EntityCategory::Customers));
        assert_eq!(analysis.suggested_followups.len(), 3);
    }

    #[test]
    fn test_multiple_entities_detected() {
        let analysis = analyze_query(
            "Which employees handled orders from customers in each region?",
            None,
        );
        assert_eq!(
            analysis.entities,
            vec![
                EntityCategory::Customers,
                EntityCategory::Orders,
                EntityCategory::Employees,
                EntityCategory::Regions,
            ]
        );
    }
}
