use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::{DocumentKey, DocumentStore},
    error::AppResult,
    models::{
        CityId, DecisionCollection, DecisionRecord, QuestionnaireResponse,
        RecommendationSnapshot, SwipeDecision, UserId,
    },
};

/// Document store kept in process memory
///
/// Used by tests and by callers that do not need durable storage.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    profiles: HashMap<UserId, QuestionnaireResponse>,
    decisions: HashMap<DocumentKey, BTreeMap<CityId, DecisionRecord>>,
    recommendations: HashMap<UserId, RecommendationSnapshot>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load_profile(&self, user_id: &UserId) -> AppResult<Option<QuestionnaireResponse>> {
        Ok(self.inner.read().await.profiles.get(user_id).cloned())
    }

    async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &QuestionnaireResponse,
    ) -> AppResult<()> {
        self.inner
            .write()
            .await
            .profiles
            .insert(user_id.clone(), profile.clone());
        Ok(())
    }

    async fn record_decision(&self, user_id: &UserId, decision: &SwipeDecision) -> AppResult<()> {
        let key = DocumentKey::Decisions(decision.collection(), user_id.clone());
        self.inner
            .write()
            .await
            .decisions
            .entry(key)
            .or_default()
            .insert(decision.city_id.clone(), decision.record.clone());
        Ok(())
    }

    async fn remove_decision(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
        city_id: &CityId,
    ) -> AppResult<bool> {
        let key = DocumentKey::Decisions(collection, user_id.clone());
        let removed = self
            .inner
            .write()
            .await
            .decisions
            .get_mut(&key)
            .and_then(|records| records.remove(city_id))
            .is_some();
        Ok(removed)
    }

    async fn list_decisions(
        &self,
        user_id: &UserId,
        collection: DecisionCollection,
    ) -> AppResult<BTreeMap<CityId, DecisionRecord>> {
        let key = DocumentKey::Decisions(collection, user_id.clone());
        Ok(self
            .inner
            .read()
            .await
            .decisions
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_recommendations(
        &self,
        user_id: &UserId,
        snapshot: &RecommendationSnapshot,
    ) -> AppResult<()> {
        self.inner
            .write()
            .await
            .recommendations
            .insert(user_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_recommendations(
        &self,
        user_id: &UserId,
    ) -> AppResult<Option<RecommendationSnapshot>> {
        Ok(self.inner.read().await.recommendations.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{City, SwipeDirection};

    fn city(id: &str, name: &str) -> City {
        City {
            id: CityId::from(id),
            name: name.to_string(),
            country: "Italy".to_string(),
            score: 0.7,
            description: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_decisions_are_keyed_by_city() {
        let store = MemoryDocumentStore::new();
        let user = UserId::from("u1");
        let rome = city("c-1", "Rome");

        let decision = SwipeDecision::new(&rome, SwipeDirection::Right);
        store.record_decision(&user, &decision).await.unwrap();
        store.record_decision(&user, &decision).await.unwrap();

        let favorites = store
            .list_decisions(&user, DecisionCollection::Favorites)
            .await
            .unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[&CityId::from("c-1")].city_name, "Rome");

        let dislikes = store
            .list_decisions(&user, DecisionCollection::Dislikes)
            .await
            .unwrap();
        assert!(dislikes.is_empty());
    }

    #[tokio::test]
    async fn test_remove_decision() {
        let store = MemoryDocumentStore::new();
        let user = UserId::from("u1");
        let decision = SwipeDecision::new(&city("c-2", "Milan"), SwipeDirection::Left);
        store.record_decision(&user, &decision).await.unwrap();

        let removed = store
            .remove_decision(&user, DecisionCollection::Dislikes, &CityId::from("c-2"))
            .await
            .unwrap();
        assert!(removed);

        let removed_again = store
            .remove_decision(&user, DecisionCollection::Dislikes, &CityId::from("c-2"))
            .await
            .unwrap();
        assert!(!removed_again);
    }

    #[tokio::test]
    async fn test_profiles_are_per_user() {
        let store = MemoryDocumentStore::new();
        let profile = crate::models::questionnaire::tests::sample_response();
        store
            .save_profile(&UserId::from("u1"), &profile)
            .await
            .unwrap();

        assert_eq!(
            store.load_profile(&UserId::from("u1")).await.unwrap(),
            Some(profile)
        );
        assert_eq!(store.load_profile(&UserId::from("u2")).await.unwrap(), None);
    }
}
