//! ============================================================================
//! DOGKING-CORE: Scoring Event Client Logic
//! ============================================================================
//! This crate holds all client-side logic for the dogking scoring event:
//! - Typed HTTP client for the remote scoring API
//! - Catalog cache with facet/custom-item filtering
//! - Score basket and date-gated submission control
//! - Leaderboard aggregation (ranking, cumulative series, item details)
//! - Session gate with a persisted local identity store
//! ============================================================================

pub mod api;
pub mod basket;
pub mod catalog;
pub mod leaderboard;
pub mod session;
pub mod submission;
pub mod types;

// Re-export main types for convenience
pub use api::{ScoreApi, DEFAULT_API_URL};
pub use basket::Basket;
pub use catalog::{Catalog, FacetSelection, FilterMode};
pub use leaderboard::{
    aggregate_items_through, build_chart, rank_users, visible_history, ChartSeries,
    ItemDetailLoader, LeaderboardChart, UserDailyItems,
};
pub use session::{Credential, SessionGate, SessionStore};
pub use submission::{
    DateGate, GateState, ScoreSheet, SubmissionConfig, SubmissionMode, DEFAULT_POOL_KEY,
};
pub use types::*;
