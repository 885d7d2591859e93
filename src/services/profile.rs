use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OnceCell;

use crate::{
    auth::AuthProvider,
    db::DocumentStore,
    error::{AppError, AppResult},
    models::{
        City, CityId, DecisionCollection, DecisionRecord, LabelMetadata, QuestionnaireResponse,
        RecommendationSnapshot, UserId,
    },
    services::{encoder::FeatureEncoder, providers::RecommendationClient, timed},
};

/// Questionnaire submission and the user's stored decisions
///
/// Label metadata is fetched from the recommendation service at most once
/// per service instance; concurrent callers share the in-flight fetch.
pub struct ProfileService {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    client: Arc<dyn RecommendationClient>,
    timeout: Duration,
    metadata: OnceCell<Arc<LabelMetadata>>,
}

impl ProfileService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        client: Arc<dyn RecommendationClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            auth,
            store,
            client,
            timeout,
            metadata: OnceCell::new(),
        }
    }

    /// Loads the label metadata, fetching it on first use
    pub async fn load_metadata(&self) -> AppResult<Arc<LabelMetadata>> {
        let metadata = self
            .metadata
            .get_or_try_init(|| async {
                let metadata = timed(self.timeout, self.client.fetch_metadata()).await?;
                if metadata.is_empty() {
                    tracing::warn!("Recommendation service returned empty label mappings");
                    return Err(AppError::MetadataNotReady);
                }
                Ok(Arc::new(metadata))
            })
            .await?;

        Ok(metadata.clone())
    }

    /// Encoder over the loaded metadata; fails until `load_metadata` succeeded
    pub fn encoder(&self) -> AppResult<FeatureEncoder> {
        self.metadata
            .get()
            .map(|metadata| FeatureEncoder::new(metadata.clone()))
            .ok_or(AppError::MetadataNotReady)
    }

    /// Stores the answers, then asks the model for matching cities
    pub async fn submit_questionnaire(&self, response: &QuestionnaireResponse) -> AppResult<Vec<City>> {
        let user_id = self.require_user()?;
        response.validate()?;

        timed(self.timeout, self.store.save_profile(&user_id, response)).await?;
        tracing::info!(user_id = %user_id, "Questionnaire answers stored");

        self.load_metadata().await?;
        let query = self.encoder()?.encode(response)?;
        tracing::debug!(user_id = %user_id, query_vector = ?query.to_query_vector(), "Questionnaire encoded");

        let cities = timed(self.timeout, self.client.recommend(&query)).await?;

        let snapshot = RecommendationSnapshot {
            cities: cities.clone(),
            generated_at: Utc::now(),
        };
        timed(
            self.timeout,
            self.store.save_recommendations(&user_id, &snapshot),
        )
        .await?;

        tracing::info!(
            user_id = %user_id,
            results = cities.len(),
            "Recommendations generated"
        );

        Ok(cities)
    }

    pub async fn profile(&self) -> AppResult<Option<QuestionnaireResponse>> {
        let user_id = self.require_user()?;
        timed(self.timeout, self.store.load_profile(&user_id)).await
    }

    /// The snapshot stored by the last questionnaire submission
    pub async fn recommendations(&self) -> AppResult<Option<RecommendationSnapshot>> {
        let user_id = self.require_user()?;
        timed(self.timeout, self.store.load_recommendations(&user_id)).await
    }

    pub async fn favorites(&self) -> AppResult<Vec<(CityId, DecisionRecord)>> {
        self.decisions(DecisionCollection::Favorites).await
    }

    pub async fn dislikes(&self) -> AppResult<Vec<(CityId, DecisionRecord)>> {
        self.decisions(DecisionCollection::Dislikes).await
    }

    /// Removes a liked city; returns whether it was stored
    pub async fn remove_favorite(&self, city_id: &CityId) -> AppResult<bool> {
        let user_id = self.require_user()?;
        let removed = timed(
            self.timeout,
            self.store
                .remove_decision(&user_id, DecisionCollection::Favorites, city_id),
        )
        .await?;

        if removed {
            tracing::info!(user_id = %user_id, city_id = %city_id, "Favorite removed");
        }
        Ok(removed)
    }

    async fn decisions(
        &self,
        collection: DecisionCollection,
    ) -> AppResult<Vec<(CityId, DecisionRecord)>> {
        let user_id = self.require_user()?;
        let records =
            timed(self.timeout, self.store.list_decisions(&user_id, collection)).await?;
        Ok(records.into_iter().collect())
    }

    fn require_user(&self) -> AppResult<UserId> {
        self.auth.current_user().ok_or(AppError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthProvider;
    use crate::db::MemoryDocumentStore;
    use crate::models::{questionnaire::tests::sample_response, Answer, SwipeDecision, SwipeDirection};
    use crate::services::providers::MockRecommendationClient;
    use std::collections::HashMap;

    fn metadata() -> LabelMetadata {
        let mut label_mappings = HashMap::new();
        label_mappings.insert(
            "budget".to_string(),
            vec![
                "Budget Friendly".to_string(),
                "Mid-Range".to_string(),
                "Luxury".to_string(),
                "Premium".to_string(),
            ],
        );
        label_mappings.insert(
            "origin_country".to_string(),
            vec!["Canada".to_string(), "Mexico".to_string()],
        );
        LabelMetadata {
            label_mappings,
            vacation_types: vec!["Beach".to_string(), "City".to_string(), "Nature".to_string()],
        }
    }

    fn lisbon() -> City {
        City {
            id: CityId::from("c-9"),
            name: "Lisbon".to_string(),
            country: "Portugal".to_string(),
            score: 0.81,
            description: None,
            image_url: None,
        }
    }

    fn service(
        client: MockRecommendationClient,
        store: Arc<MemoryDocumentStore>,
        user: Option<&str>,
    ) -> ProfileService {
        let auth = Arc::new(LocalAuthProvider::restore(user.map(UserId::from)));
        ProfileService::new(auth, store, Arc::new(client), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_metadata_is_fetched_once() {
        let mut client = MockRecommendationClient::new();
        client
            .expect_fetch_metadata()
            .times(1)
            .returning(|| Ok(metadata()));

        let service = service(client, Arc::new(MemoryDocumentStore::new()), Some("u1"));
        let first = service.load_metadata().await.unwrap();
        let second = service.load_metadata().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_encoder_before_metadata_is_not_ready() {
        let service = service(
            MockRecommendationClient::new(),
            Arc::new(MemoryDocumentStore::new()),
            Some("u1"),
        );
        assert!(matches!(service.encoder(), Err(AppError::MetadataNotReady)));
    }

    #[tokio::test]
    async fn test_empty_metadata_is_not_cached() {
        let mut client = MockRecommendationClient::new();
        let mut calls = 0;
        client.expect_fetch_metadata().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(LabelMetadata::default())
            } else {
                Ok(metadata())
            }
        });

        let service = service(client, Arc::new(MemoryDocumentStore::new()), Some("u1"));
        assert!(matches!(
            service.load_metadata().await,
            Err(AppError::MetadataNotReady)
        ));
        assert!(service.load_metadata().await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_stores_profile_and_snapshot() {
        let mut client = MockRecommendationClient::new();
        client
            .expect_fetch_metadata()
            .times(1)
            .returning(|| Ok(metadata()));
        client
            .expect_recommend()
            .withf(|query| {
                // Canada, then unmapped features, Luxury at index 2; Beach and Nature
                query.to_query_vector() == vec![0, -1, 2, -1, -1, -1, 1, 0, 1]
            })
            .times(1)
            .returning(|_| Ok(vec![lisbon()]));

        let store = Arc::new(MemoryDocumentStore::new());
        let service = service(client, store.clone(), Some("u1"));

        let cities = service
            .submit_questionnaire(&sample_response())
            .await
            .unwrap();
        assert_eq!(cities, vec![lisbon()]);

        assert_eq!(service.profile().await.unwrap(), Some(sample_response()));
        let snapshot = service.recommendations().await.unwrap().unwrap();
        assert_eq!(snapshot.cities, vec![lisbon()]);
    }

    #[tokio::test]
    async fn test_invalid_questionnaire_is_rejected_before_any_call() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = service(MockRecommendationClient::new(), store.clone(), Some("u1"));

        let mut response = sample_response();
        response.set(3, Answer::Selections(vec![]));

        let result = service.submit_questionnaire(&response).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(store.load_profile(&UserId::from("u1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_submit_requires_user() {
        let service = service(
            MockRecommendationClient::new(),
            Arc::new(MemoryDocumentStore::new()),
            None,
        );
        let result = service.submit_questionnaire(&sample_response()).await;
        assert!(matches!(result, Err(AppError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_favorites_and_removal() {
        let store = Arc::new(MemoryDocumentStore::new());
        let user = UserId::from("u1");
        store
            .record_decision(&user, &SwipeDecision::new(&lisbon(), SwipeDirection::Right))
            .await
            .unwrap();

        let service = service(MockRecommendationClient::new(), store, Some("u1"));
        let favorites = service.favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].0, CityId::from("c-9"));
        assert_eq!(favorites[0].1.country_name, "Portugal");
        assert!(service.dislikes().await.unwrap().is_empty());

        assert!(service.remove_favorite(&CityId::from("c-9")).await.unwrap());
        assert!(service.favorites().await.unwrap().is_empty());
    }
}
