/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("No signed-in user")]
    NotAuthenticated,

    #[error("No questionnaire responses on file for user {0}")]
    ProfileMissing(String),

    #[error("Label mappings have not been loaded")]
    MetadataNotReady,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Document store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the user can be offered a retry for this failure.
    ///
    /// Authentication and profile problems need a different flow (sign in,
    /// fill in the questionnaire) and are never retried in place.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::HttpClient(_)
                | AppError::NetworkFailure(_)
                | AppError::Timeout(_)
                | AppError::ExternalApi(_)
                | AppError::Store(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
