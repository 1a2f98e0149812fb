pub mod response;
pub mod session;

pub use response::{
    ConversationalResponse, GlobalStatistics, QueryStats, SessionHistory, SessionStatistics,
    StrategyUsed, UserPreferences,
};
pub use session::{
    EntityCategory, Feedback, Intent, Interaction, InteractionMetadata, Session, SessionContext,
};
