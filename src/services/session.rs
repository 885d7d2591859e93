use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthProvider,
    db::DocumentStore,
    error::{AppError, AppResult},
    models::{City, CityId, NextCityRequest, SwipeDecision, SwipeDirection, UserId},
    services::{providers::RecommendationClient, timed},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    Next,
}

/// Where a recommendation session is in its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Loading(LoadKind),
    Showing(City),
    Committing {
        city: City,
        direction: SwipeDirection,
    },
    /// The service has no candidates left
    Exhausted,
    /// The session was discarded; late results are dropped
    TornDown,
}

/// A failure surfaced to the user alongside the last displayable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub message: String,
    pub retryable: bool,
}

impl From<&AppError> for SessionError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.to_string(),
            retryable: e.is_recoverable(),
        }
    }
}

/// What observers render
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub error: Option<SessionError>,
}

/// Result of a commit request
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Decision stored and the next city is showing
    Advanced(City),
    /// Decision stored and no candidates remain
    Exhausted,
    /// Not showing a city, another commit is in flight, or the card is stale
    Ignored,
    /// The session was torn down before the commit resolved
    Discarded,
}

struct SessionInner {
    state: SessionState,
    error: Option<SessionError>,
    /// Bumped on every start and on teardown; results from an older epoch
    /// are dropped
    epoch: u64,
    user_id: Option<UserId>,
    request: Option<NextCityRequest>,
    /// Decision already written for the city still on screen
    persisted: Option<SwipeDecision>,
    decided: HashSet<CityId>,
    auth_listener: Option<JoinHandle<()>>,
}

struct SessionShared {
    id: Uuid,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    client: Arc<dyn RecommendationClient>,
    timeout: Duration,
    inner: Mutex<SessionInner>,
    view_tx: watch::Sender<SessionView>,
}

/// Drives one swipe session: loads the first city, records decisions and
/// advances to the next city.
///
/// Cloning yields another handle to the same session. The internal lock is
/// only held between awaits, never across one.
#[derive(Clone)]
pub struct RecommendationSession {
    shared: Arc<SessionShared>,
}

impl RecommendationSession {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        client: Arc<dyn RecommendationClient>,
        timeout: Duration,
    ) -> Self {
        let (view_tx, _) = watch::channel(SessionView {
            state: SessionState::Idle,
            error: None,
        });

        Self {
            shared: Arc::new(SessionShared {
                id: Uuid::new_v4(),
                auth,
                store,
                client,
                timeout,
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    error: None,
                    epoch: 0,
                    user_id: None,
                    request: None,
                    persisted: None,
                    decided: HashSet::new(),
                    auth_listener: None,
                }),
                view_tx,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn view(&self) -> SessionView {
        let inner = self.lock();
        SessionView {
            state: inner.state.clone(),
            error: inner.error.clone(),
        }
    }

    /// The city on screen, including while its decision is being committed
    pub fn current_city(&self) -> Option<City> {
        match &self.lock().state {
            SessionState::Showing(city) | SessionState::Committing { city, .. } => {
                Some(city.clone())
            }
            _ => None,
        }
    }

    /// Subscribes to state changes; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.shared.view_tx.subscribe()
    }

    /// Loads the first city for the signed-in user
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn start(&self) -> AppResult<SessionState> {
        let epoch = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Idle => {}
                SessionState::TornDown => {
                    return Err(AppError::Internal("Session was torn down".to_string()))
                }
                _ => return Ok(inner.state.clone()),
            }
            inner.epoch += 1;
            inner.error = None;
            self.transition(&mut inner, SessionState::Loading(LoadKind::Initial));
            inner.epoch
        };

        match self.load_initial().await {
            Ok((user_id, request, city)) => {
                let mut inner = self.lock();
                if inner.epoch != epoch {
                    tracing::debug!("Session torn down during initial load, result discarded");
                    return Ok(inner.state.clone());
                }
                inner.user_id = Some(user_id);
                inner.request = Some(request);
                let state = match city {
                    Some(city) => {
                        tracing::info!(city_id = %city.id, "Showing first city");
                        SessionState::Showing(city)
                    }
                    None => {
                        tracing::info!("No recommendations available");
                        SessionState::Exhausted
                    }
                };
                self.transition(&mut inner, state.clone());
                Ok(state)
            }
            Err(e) => {
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    tracing::warn!(error = %e, "Initial load failed");
                    inner.error = Some(SessionError::from(&e));
                    self.transition(&mut inner, SessionState::Idle);
                }
                Err(e)
            }
        }
    }

    async fn load_initial(&self) -> AppResult<(UserId, NextCityRequest, Option<City>)> {
        let user_id = self
            .shared
            .auth
            .current_user()
            .ok_or(AppError::NotAuthenticated)?;

        let profile = timed(self.shared.timeout, self.shared.store.load_profile(&user_id))
            .await?
            .ok_or_else(|| AppError::ProfileMissing(user_id.to_string()))?;

        let request = NextCityRequest::new(user_id.clone(), &profile);
        let city = timed(self.shared.timeout, self.shared.client.next_city(&request)).await?;

        Ok((user_id, request, city))
    }

    /// Commits a decision for whichever city is on screen
    pub async fn commit(&self, direction: SwipeDirection) -> AppResult<CommitOutcome> {
        self.commit_inner(None, direction).await
    }

    /// Commits a decision only if `city_id` is still the city on screen
    pub async fn commit_for(
        &self,
        city_id: &CityId,
        direction: SwipeDirection,
    ) -> AppResult<CommitOutcome> {
        self.commit_inner(Some(city_id), direction).await
    }

    #[instrument(skip(self, expected), fields(session_id = %self.shared.id))]
    async fn commit_inner(
        &self,
        expected: Option<&CityId>,
        direction: SwipeDirection,
    ) -> AppResult<CommitOutcome> {
        let (epoch, city, user_id, request, persisted) = {
            let mut inner = self.lock();
            let city = match &inner.state {
                SessionState::Showing(city) => city.clone(),
                other => {
                    tracing::debug!(state = ?other, "Commit ignored, not showing a city");
                    return Ok(CommitOutcome::Ignored);
                }
            };
            if expected.is_some_and(|id| *id != city.id) {
                tracing::debug!(city_id = %city.id, "Commit ignored, card is stale");
                return Ok(CommitOutcome::Ignored);
            }
            let (Some(user_id), Some(request)) = (inner.user_id.clone(), inner.request.clone())
            else {
                return Ok(CommitOutcome::Ignored);
            };

            inner.error = None;
            self.transition(
                &mut inner,
                SessionState::Committing {
                    city: city.clone(),
                    direction,
                },
            );
            (inner.epoch, city, user_id, request, inner.persisted.clone())
        };

        if self.shared.auth.current_user().as_ref() != Some(&user_id) {
            return self.revert(epoch, city, AppError::NotAuthenticated);
        }

        let decision = SwipeDecision::new(&city, direction);
        if let Err(e) = self.persist(epoch, &user_id, &decision, persisted).await {
            return self.revert(epoch, city, e);
        }

        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return Ok(CommitOutcome::Discarded);
            }
            inner.persisted = Some(decision);
            self.transition(&mut inner, SessionState::Loading(LoadKind::Next));
        }

        let next = timed(self.shared.timeout, self.shared.client.next_city(&request)).await;
        let next = match next {
            Ok(next) => next,
            Err(e) => return self.revert(epoch, city, e),
        };

        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::debug!("Session torn down during fetch, next city discarded");
            return Ok(CommitOutcome::Discarded);
        }
        inner.persisted = None;
        inner.decided.insert(city.id.clone());

        tracing::info!(city_id = %city.id, direction = %direction, "Decision committed");

        match next {
            Some(next) => {
                if inner.decided.contains(&next.id) {
                    tracing::warn!(city_id = %next.id, "Service re-offered a decided city");
                }
                self.transition(&mut inner, SessionState::Showing(next.clone()));
                Ok(CommitOutcome::Advanced(next))
            }
            None => {
                tracing::info!("Recommendations exhausted");
                self.transition(&mut inner, SessionState::Exhausted);
                Ok(CommitOutcome::Exhausted)
            }
        }
    }

    /// Writes the decision unless the same one was already written for this
    /// city by an earlier attempt whose fetch failed
    async fn persist(
        &self,
        epoch: u64,
        user_id: &UserId,
        decision: &SwipeDecision,
        persisted: Option<SwipeDecision>,
    ) -> AppResult<()> {
        if let Some(previous) = persisted.filter(|p| p.city_id == decision.city_id) {
            if previous.direction == decision.direction {
                tracing::debug!(city_id = %decision.city_id, "Decision already stored, skipping write");
                return Ok(());
            }
            timed(
                self.shared.timeout,
                self.shared
                    .store
                    .remove_decision(user_id, previous.collection(), &previous.city_id),
            )
            .await?;

            // Nothing is stored for this city until the new write lands
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.persisted = None;
            }
        }

        timed(
            self.shared.timeout,
            self.shared.store.record_decision(user_id, decision),
        )
        .await
    }

    fn revert(&self, epoch: u64, city: City, e: AppError) -> AppResult<CommitOutcome> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Ok(CommitOutcome::Discarded);
        }

        tracing::warn!(city_id = %city.id, error = %e, "Commit failed, keeping current city");
        inner.error = Some(SessionError::from(&e));
        self.transition(&mut inner, SessionState::Showing(city));
        Err(e)
    }

    /// Retries the initial load after a failure; a no-op in any other state
    pub async fn retry(&self) -> AppResult<SessionState> {
        if self.state() == SessionState::Idle {
            self.start().await
        } else {
            Ok(self.state())
        }
    }

    /// Tears the session down when the signed-in user changes or signs out
    pub fn attach_auth_listener(&self) {
        let mut rx = self.shared.auth.subscribe();
        let signed_in = rx.borrow_and_update().clone();
        let weak: Weak<SessionShared> = Arc::downgrade(&self.shared);

        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() != signed_in {
                    if let Some(shared) = weak.upgrade() {
                        tracing::info!(session_id = %shared.id, "Signed-in user changed");
                        RecommendationSession { shared }.teardown();
                    }
                    break;
                }
            }
        });

        let mut inner = self.lock();
        if let Some(previous) = inner.auth_listener.replace(handle) {
            previous.abort();
        }
    }

    /// Discards the session; pending results are dropped on arrival
    pub fn teardown(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::TornDown {
            return;
        }
        inner.epoch += 1;
        inner.persisted = None;
        inner.error = None;
        if let Some(listener) = inner.auth_listener.take() {
            listener.abort();
        }
        tracing::info!(session_id = %self.shared.id, "Session torn down");
        self.transition(&mut inner, SessionState::TornDown);
    }


    fn transition(&self, inner: &mut SessionInner, state: SessionState) {
        inner.state = state;
        self.shared.view_tx.send_replace(SessionView {
            state: inner.state.clone(),
            error: inner.error.clone(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
