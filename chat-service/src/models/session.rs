//! Session model for conversation context tracking.

use crate::models::response::StrategyUsed;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A coarse topic label detected lexically in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Products,
    Customers,
    Orders,
    Employees,
    Regions,
}

impl EntityCategory {
    /// All categories, in detection order.
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Products,
        EntityCategory::Customers,
        EntityCategory::Orders,
        EntityCategory::Employees,
        EntityCategory::Regions,
    ];

    /// Keywords whose presence marks a question as touching this category.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            EntityCategory::Products => {
                &["product", "item", "food", "beverage", "category", "supplier"]
            }
            EntityCategory::Customers => &["customer", "client", "buyer", "company", "contact"],
            EntityCategory::Orders => &["order", "purchase", "sale", "transaction", "delivery"],
            EntityCategory::Employees => &["employee", "staff", "worker", "manager"],
            EntityCategory::Regions => &["region", "territory", "area", "location", "country", "city"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityCategory::Products => "products",
            EntityCategory::Customers => "customers",
            EntityCategory::Orders => "orders",
            EntityCategory::Employees => "employees",
            EntityCategory::Regions => "regions",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user is currently trying to do with the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Counting,
    Comparing,
    Browsing,
}

/// Inferred conversational context, recomputed from the most recent
/// interaction. Never rolled back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Topic the conversation currently revolves around.
    pub topic: Option<EntityCategory>,

    /// Inferred user intent.
    pub intent: Option<Intent>,

    /// Entity categories detected in the latest question.
    pub entities: Vec<EntityCategory>,

    /// Strategy used for the most recent interaction.
    pub last_strategy: Option<StrategyUsed>,
}

/// User feedback attached to a recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Rating from 1 to 5.
    pub rating: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// When the feedback was submitted.
    pub timestamp: DateTime<Utc>,
}

/// Structured metadata recorded alongside each interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionMetadata {
    /// Routing confidence for the answer.
    pub confidence: f32,

    /// Sources the answer was derived from.
    pub sources: Vec<String>,

    /// Placeholder for the SQL query, when the SQL agent was involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,

    /// Entity categories detected in the question.
    pub entities: Vec<EntityCategory>,

    /// Feedback attached after the fact, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

/// One question/answer exchange within a session. Immutable once appended,
/// except for feedback attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub strategy: StrategyUsed,
    pub metadata: InteractionMetadata,
}

/// A conversation session that maintains context across multiple requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session last saw activity.
    pub last_activity: DateTime<Utc>,

    /// Recorded interactions, in arrival order.
    pub history: Vec<Interaction>,

    /// Context inferred from the latest interaction.
    pub context: SessionContext,
}

/// Topic keywords for context tracking. Narrower than the classifier's entity
/// sets: only words specific enough to pin the conversation to one topic.
const PRODUCT_TOPIC_WORDS: [&str; 4] = ["product", "item", "food", "beverage"];
const CUSTOMER_TOPIC_WORDS: [&str; 3] = ["customer", "client", "buyer"];
const ORDER_TOPIC_WORDS: [&str; 3] = ["order", "purchase", "sale"];

const COUNTING_WORDS: [&str; 4] = ["how many", "count", "total", "number"];
const COMPARING_WORDS: [&str; 4] = ["compare", "difference", "versus", "vs"];
const BROWSING_WORDS: [&str; 4] = ["list", "show", "what", "which"];

impl Session {
    /// Create a new, empty session.
    pub fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            last_activity: now,
            history: Vec::new(),
            context: SessionContext::default(),
        }
    }

    /// Append a question/answer pair and recompute the conversational context
    /// from the new question.
    pub fn add_interaction(
        &mut self,
        question: &str,
        answer: &str,
        strategy: StrategyUsed,
        metadata: InteractionMetadata,
    ) {
        self.last_activity = Utc::now();
        self.update_context(question, strategy, &metadata);
        self.history.push(Interaction {
            timestamp: self.last_activity,
            question: question.to_string(),
            answer: answer.to_string(),
            strategy,
            metadata,
        });
    }

    /// Recompute topic/intent/entities from the latest question. At most one
    /// topic and one intent can change per call; an unmatched question leaves
    /// the previous value in place.
    fn update_context(&mut self, question: &str, strategy: StrategyUsed, metadata: &InteractionMetadata) {
        let question_lower = question.to_lowercase();
        let contains = |words: &[&str]| words.iter().any(|w| question_lower.contains(w));

        if contains(&PRODUCT_TOPIC_WORDS) {
            self.context.topic = Some(EntityCategory::Products);
        } else if contains(&CUSTOMER_TOPIC_WORDS) {
            self.context.topic = Some(EntityCategory::Customers);
        } else if contains(&ORDER_TOPIC_WORDS) {
            self.context.topic = Some(EntityCategory::Orders);
        }

        if contains(&COUNTING_WORDS) {
            self.context.intent = Some(Intent::Counting);
        } else if contains(&COMPARING_WORDS) {
            self.context.intent = Some(Intent::Comparing);
        } else if contains(&BROWSING_WORDS) {
            self.context.intent = Some(Intent::Browsing);
        }

        self.context.entities = metadata.entities.clone();
        self.context.last_strategy = Some(strategy);
    }

    /// Summarize the last `last_n` interactions for prompt context.
    pub fn conversation_summary(&self, last_n: usize) -> String {
        if self.history.is_empty() {
            return "No previous conversation.".to_string();
        }

        let start = self.history.len().saturating_sub(last_n);
        let parts: Vec<String> = self.history[start..]
            .iter()
            .enumerate()
            .map(|(i, interaction)| {
                let answer: String = interaction.answer.chars().take(200).collect();
                let ellipsis = if interaction.answer.chars().count() > 200 {
                    "..."
                } else {
                    ""
                };
                format!(
                    "Q{}: {}\nA{}: {}{}",
                    i + 1,
                    interaction.question,
                    i + 1,
                    answer,
                    ellipsis
                )
            })
            .collect();

        parts.join("\n\n")
    }

    /// Whether the session has been idle longer than `timeout`.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        Utc::now() - self.last_activity > timeout
    }
}
