use std::collections::BTreeMap;
use std::fmt::Display;

use crate::{
    error::AppResult,
    models::{
        CityId, DecisionCollection, DecisionRecord, QuestionnaireResponse,
        RecommendationSnapshot, SwipeDecision, UserId,
    },
};

pub mod memory;
pub mod redis;

pub use memory::MemoryDocumentStore;
pub use self::redis::{create_redis_client, RedisDocumentStore, StoreWriterHandle};

/// Location of a per-user document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Profile(UserId),
    Decisions(DecisionCollection, UserId),
    Recommendations(UserId),
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKey::Profile(user_id) => write!(f, "profiles:{}", user_id),
            DocumentKey::Decisions(collection, user_id) => write!(f, "{}:{}", collection, user_id),
            DocumentKey::Recommendations(user_id) => write!(f, "recommendations:{}", user_id),
        }
    }
}

/// Per-user document storage for profiles, decisions and recommendation
/// snapshots
///
/// Decisions are keyed by city identifier, so recording the same decision
/// twice leaves a single record.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stored questionnaire answers, `None` if the user never submitted them
    async fn load_profile(&self, user_id: &UserId) -> AppResult<Option<QuestionnaireResponse>>;

    async fn save_profile(&self, user_id: &UserId, profile: &QuestionnaireResponse)
        -> AppResult<()>;

    /// Writes the decision into the collection matching its direction
    async fn record_decision(&self, user_id: &UserId, decision: &SwipeDecision) -> AppResult<()>;

    /// Deletes one decision; returns whether a record was removed
    async fn remove_decision(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
        city_id: &CityId,
    ) -> AppResult<bool>;

    async fn list_decisions(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
    ) -> AppResult<BTreeMap<CityId, DecisionRecord>>;

    async fn save_recommendations(
        &self,
        user_id: &UserId,
        snapshot: &RecommendationSnapshot,
    ) -> AppResult<()>;

    async fn load_recommendations(
        &self,
        user_id: &UserId,
    ) -> AppResult<Option<RecommendationSnapshot>>;
}
