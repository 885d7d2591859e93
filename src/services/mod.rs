use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub mod encoder;
pub mod gesture;
pub mod profile;
pub mod providers;
pub mod session;

pub use encoder::FeatureEncoder;
pub use gesture::{CardTransform, GestureConfig, GestureEvent, SwipeGestureInterpreter};
pub use profile::ProfileService;
pub use session::{CommitOutcome, RecommendationSession, SessionError, SessionState, SessionView};

/// Bounds a collaborator call by `timeout`; expiry becomes `AppError::Timeout`
pub(crate) async fn timed<T>(
    timeout: Duration,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(timeout.as_millis() as u64)),
    }
}
