/// HTTP/JSON recommendation service client
///
/// Endpoints:
/// 1. Metadata: `GET /metadata` → label mappings + vacation-type vocabulary
/// 2. Recommend: `POST /recommend` with the flattened query vector
/// 3. Next city: `POST /next_city` with the stored profile answers
use crate::{
    error::{AppError, AppResult},
    models::{
        City, FeatureVector, LabelMetadata, NextCityRequest, NextCityResponse, RecommendRequest,
        RecommendResponse,
    },
    services::providers::RecommendationClient,
};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use std::time::Duration;

#[derive(Clone)]
pub struct HttpRecommendationClient {
    http_client: HttpClient,
    api_url: String,
    timeout: Duration,
}

impl HttpRecommendationClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    /// Sends the request and turns transport failures and non-2xx statuses
    /// into `AppError`s
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> AppResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                endpoint = %endpoint,
                status = %status,
                body = %body,
                "Recommendation service request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "Recommendation service returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_connect() {
            AppError::NetworkFailure(e.to_string())
        } else {
            AppError::HttpClient(e)
        }
    }
}

/// Parses a `/next_city` body; an empty body means no candidates remain
pub(crate) fn parse_next_city(body: &str) -> AppResult<Option<City>> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let response: NextCityResponse = serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, body = %body, "Failed to deserialize next city response");
        AppError::ExternalApi(format!("Failed to parse next city response: {}", e))
    })?;

    Ok(response.city)
}

#[async_trait::async_trait]
impl RecommendationClient for HttpRecommendationClient {
    async fn fetch_metadata(&self) -> AppResult<LabelMetadata> {
        let url = self.endpoint("metadata");
        let response = self.send(self.http_client.get(&url), "metadata").await?;

        let metadata: LabelMetadata = response.json().await?;

        tracing::info!(
            features = metadata.label_mappings.len(),
            vacation_types = metadata.vacation_types.len(),
            provider = self.name(),
            "Label metadata fetched"
        );

        Ok(metadata)
    }

    async fn recommend(&self, query: &FeatureVector) -> AppResult<Vec<City>> {
        let url = self.endpoint("recommend");
        let body = RecommendRequest {
            query_vector: query.to_query_vector(),
        };

        tracing::debug!(query_vector = ?body.query_vector, "Requesting recommendations");

        let response = self
            .send(self.http_client.post(&url).json(&body), "recommend")
            .await?;
        let recommendations: RecommendResponse = response.json().await?;

        tracing::info!(
            results = recommendations.recommendations.len(),
            provider = self.name(),
            "Recommendations fetched"
        );

        Ok(recommendations.recommendations)
    }

    async fn next_city(&self, request: &NextCityRequest) -> AppResult<Option<City>> {
        let url = self.endpoint("next_city");
        let response = self
            .send(self.http_client.post(&url).json(request), "next_city")
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            tracing::info!(user_id = %request.user_id, "No next city, candidates exhausted");
            return Ok(None);
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let city = parse_next_city(&body)?;

        match &city {
            Some(city) => tracing::info!(
                user_id = %request.user_id,
                city_id = %city.id,
                provider = self.name(),
                "Next city fetched"
            ),
            None => tracing::info!(user_id = %request.user_id, "No next city, candidates exhausted"),
        }

        Ok(city)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
