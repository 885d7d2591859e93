/// Recommendation service abstraction
///
/// The model-serving endpoint that encodes cities and picks the next
/// candidate lives outside this crate. The session controller and the
/// profile service only see this trait, so tests substitute mocks and the
/// binary plugs in the HTTP implementation.
use crate::{
    error::AppResult,
    models::{City, FeatureVector, LabelMetadata, NextCityRequest},
};

pub mod http;

pub use http::HttpRecommendationClient;

/// Trait for recommendation service clients
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationClient: Send + Sync {
    /// Fetch the label mappings and vacation-type vocabulary
    ///
    /// The encoder cannot run until this has succeeded once.
    async fn fetch_metadata(&self) -> AppResult<LabelMetadata>;

    /// Rank cities for an encoded questionnaire
    async fn recommend(&self, query: &FeatureVector) -> AppResult<Vec<City>>;

    /// Fetch the next city to review
    ///
    /// Returns `None` once the service has no candidates left for the user.
    /// The service is responsible for never re-offering a decided city.
    async fn next_city(&self, request: &NextCityRequest) -> AppResult<Option<City>>;

    /// Client name for logging and debugging
    fn name(&self) -> &'static str;
}
