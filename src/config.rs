use serde::Deserialize;
use std::time::Duration;

/// Client configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the recommendation service
    #[serde(default = "default_recommendation_api_url")]
    pub recommendation_api_url: String,

    /// Upper bound for every call to an external collaborator
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Redis connection URL for the document store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// User to restore into the auth provider on launch
    #[serde(default)]
    pub user_id: Option<String>,

    /// Width of the swipe surface, used for fly-out and rotation
    #[serde(default = "default_screen_width")]
    pub screen_width: f64,
}

fn default_recommendation_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_screen_width() -> f64 {
    400.0
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
