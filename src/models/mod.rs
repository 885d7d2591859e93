use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};

pub mod questionnaire;

pub use questionnaire::{
    Answer, ProfileFeatures, Question, QuestionKind, QuestionnaireFlow, QuestionnaireResponse,
    QuestionnaireStep, QUESTIONS,
};

/// Identifier of a signed-in user, as issued by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

/// Identifier of a recommended city, assigned by the recommendation service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub String);

impl Display for CityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CityId {
    fn from(id: &str) -> Self {
        CityId(id.to_string())
    }
}

/// A recommendation candidate returned by the recommendation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    #[serde(rename = "city_id")]
    pub id: CityId,
    #[serde(rename = "city_name")]
    pub name: String,
    pub country: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "image", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    /// Collection a decision in this direction is persisted to
    pub fn collection(self) -> DecisionCollection {
        match self {
            SwipeDirection::Right => DecisionCollection::Favorites,
            SwipeDirection::Left => DecisionCollection::Dislikes,
        }
    }
}

impl Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwipeDirection::Left => write!(f, "left"),
            SwipeDirection::Right => write!(f, "right"),
        }
    }
}

/// Per-user collections holding swipe decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionCollection {
    Favorites,
    Dislikes,
}

impl Display for DecisionCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionCollection::Favorites => write!(f, "favorites"),
            DecisionCollection::Dislikes => write!(f, "dislikes"),
        }
    }
}

/// Denormalized city record stored under the city identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub city_name: String,
    pub country_name: String,
    pub score: f64,
}

/// A committed like/dislike for one city
#[derive(Debug, Clone, PartialEq)]
pub struct SwipeDecision {
    pub city_id: CityId,
    pub direction: SwipeDirection,
    pub record: DecisionRecord,
}

impl SwipeDecision {
    pub fn new(city: &City, direction: SwipeDirection) -> Self {
        Self {
            city_id: city.id.clone(),
            direction,
            record: DecisionRecord {
                city_name: city.name.clone(),
                country_name: city.country.clone(),
                score: city.score,
            },
        }
    }

    pub fn collection(&self) -> DecisionCollection {
        self.direction.collection()
    }
}

/// Cities generated by `/recommend` for a submitted questionnaire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSnapshot {
    pub cities: Vec<City>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Recommendation Service Types
// ============================================================================

/// Label mappings and vocabulary published by `GET /metadata`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelMetadata {
    #[serde(default)]
    pub label_mappings: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub vacation_types: Vec<String>,
}

impl LabelMetadata {
    pub fn is_empty(&self) -> bool {
        self.label_mappings.is_empty()
    }
}

/// Encoded questionnaire, in the order the model expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub categorical: Vec<i64>,
    pub vacation_types: Vec<i64>,
}

impl FeatureVector {
    /// Flattened wire form: categorical indices, then the multi-hot segment
    pub fn to_query_vector(&self) -> Vec<i64> {
        self.categorical
            .iter()
            .chain(self.vacation_types.iter())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.categorical.len() + self.vacation_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of `POST /recommend`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub query_vector: Vec<i64>,
}

/// Response of `POST /recommend`
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendResponse {
    #[serde(default)]
    pub recommendations: Vec<City>,
}

/// Body of `POST /next_city`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextCityRequest {
    pub user_id: UserId,
    pub origin_country: String,
    pub vacation_types: Vec<String>,
    pub seasons: Vec<String>,
    pub budget: Vec<String>,
    pub favorite_country_visited: String,
    pub place_type: Vec<String>,
}

impl NextCityRequest {
    pub fn new(user_id: UserId, profile: &QuestionnaireResponse) -> Self {
        Self {
            user_id,
            origin_country: profile.text(questionnaire::ORIGIN_COUNTRY),
            vacation_types: profile.selections(questionnaire::VACATION_TYPES),
            seasons: profile.selections(questionnaire::SEASONS),
            budget: profile.selections(questionnaire::BUDGET),
            favorite_country_visited: profile.text(questionnaire::FAVORITE_COUNTRY),
            place_type: profile.selections(questionnaire::PLACE_TYPE),
        }
    }
}

/// Response of `POST /next_city`; `city` is absent once candidates run out
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextCityResponse {
    #[serde(default)]
    pub city: Option<City>,
}
