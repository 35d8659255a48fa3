//! Per-request snapshot of who is signed in and how to reach the backend.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use service_core::error::AppError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tower_sessions::Session;

use crate::flash::Toast;
use crate::models::{
    AuthSession, NewRegistration, Registration, RegistrationStatus, SessionPair, User,
};
use crate::services::backend::{Backend, REGISTRATIONS_TABLE};
use crate::state::store;
use crate::AppState;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Backend client is not initialized.")]
    ServiceUnavailable,

    #[error("Please log in to register.")]
    Unauthenticated,

    #[error("Failed to register: {0}")]
    RemoteRejected(String),

    #[error("Failed to register: no registration was returned.")]
    EmptyResult,

    /// Detail is for the log; the user only sees the generic message.
    #[error("An error occurred during registration.")]
    Unexpected(String),
}

impl RegistrationError {
    pub fn toast(&self) -> Toast {
        Toast::error(self.to_string())
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            RegistrationError::ServiceUnavailable => "service_unavailable",
            RegistrationError::Unauthenticated => "unauthenticated",
            RegistrationError::RemoteRejected(_) => "rejected",
            RegistrationError::EmptyResult => "empty_result",
            RegistrationError::Unexpected(_) => "unexpected",
        }
    }
}

pub const REGISTERED_MESSAGE: &str = "Successfully registered for the event!";

/// Cached session, identity and backend handle.
///
/// Built fresh for every request by the extractor; nothing here talks to
/// the network except [`UserState::register`] and [`UserState::log_out`].
#[derive(Clone, Default)]
pub struct UserState {
    session: Option<AuthSession>,
    user: Option<User>,
    backend: Option<Arc<dyn Backend>>,
}

impl fmt::Debug for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserState")
            .field("user_id", &self.user.as_ref().map(|u| u.id.as_str()))
            .field("has_session", &self.session.is_some())
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}

impl UserState {
    pub fn new(
        session: Option<AuthSession>,
        user: Option<User>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Self {
        Self {
            session,
            user,
            backend,
        }
    }

    pub fn from_pair(pair: Option<SessionPair>, backend: Option<Arc<dyn Backend>>) -> Self {
        match pair {
            Some(SessionPair { session, user }) => Self::new(Some(session), Some(user), backend),
            None => Self::new(None, None, backend),
        }
    }

    /// Overwrite all three fields at once. No validation.
    pub fn replace_state(
        &mut self,
        session: Option<AuthSession>,
        user: Option<User>,
        backend: Option<Arc<dyn Backend>>,
    ) {
        *self = Self::new(session, user, backend);
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn backend(&self) -> Option<&Arc<dyn Backend>> {
        self.backend.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some() && self.user.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    /// Register the current user for an event as `pending`.
    ///
    /// Single attempt; duplicates are the store's business and come back as
    /// [`RegistrationError::RemoteRejected`].
    pub async fn register(&self, event_id: &str) -> Result<Registration, RegistrationError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or(RegistrationError::ServiceUnavailable)?;

        let (session, user) = match (&self.session, &self.user) {
            (Some(session), Some(user)) => (session, user),
            _ => return Err(RegistrationError::Unauthenticated),
        };

        let row = NewRegistration {
            event_id: event_id.to_string(),
            user_id: user.id.clone(),
            status: RegistrationStatus::Pending,
        };
        let payload =
            serde_json::to_value(&row).map_err(|e| RegistrationError::Unexpected(e.to_string()))?;

        let rows = backend
            .insert(REGISTRATIONS_TABLE, payload, Some(&session.access_token))
            .await
            .map_err(|e| {
                if e.is_backend_answer() {
                    tracing::warn!(event_id, user_id = %user.id, error = %e, "Registration rejected");
                    RegistrationError::RemoteRejected(e.message)
                } else {
                    tracing::error!(event_id, user_id = %user.id, error = %e, "Registration error");
                    RegistrationError::Unexpected(e.to_string())
                }
            })?;

        let stored = rows
            .into_iter()
            .next()
            .ok_or(RegistrationError::EmptyResult)?;

        let registration: Registration = serde_json::from_value(stored).map_err(|e| {
            tracing::error!(event_id, error = %e, "Registration row could not be decoded");
            RegistrationError::Unexpected(e.to_string())
        })?;

        tracing::info!(
            event_id,
            user_id = %user.id,
            registration_id = %registration.id,
            "User registered for event"
        );

        Ok(registration)
    }

    /// Best-effort sign-out at the backend. Leaves this snapshot untouched;
    /// callers drop the stored pair themselves.
    pub async fn log_out(&self) {
        let (Some(backend), Some(session)) = (&self.backend, &self.session) else {
            return;
        };

        match backend.sign_out(&session.access_token).await {
            Ok(()) => tracing::info!("Session revoked at backend"),
            Err(e) => tracing::error!(error = %e, "Failed to revoke session during logout"),
        }
    }
}

/// Resolve the stored pair for this browser session: refresh it when the
/// access token has expired and confirm it with the backend.
///
/// A rejected refresh or token drops the stored pair. An unreachable backend
/// makes this request anonymous but keeps the pair for the next one.
pub async fn resolve_pair(
    backend: &dyn Backend,
    session: &Session,
) -> anyhow::Result<Option<SessionPair>> {
    let Some(mut pair) = store::load_pair(session).await? else {
        return Ok(None);
    };

    if pair.session.is_expired() {
        match backend.refresh_session(&pair.session.refresh_token).await {
            Ok((refreshed, user)) => {
                pair = SessionPair {
                    session: refreshed,
                    user,
                };
                store::save_pair(session, &pair).await?;
                tracing::debug!(user_id = %pair.user.id, "Session refreshed");
            }
            Err(e) => {
                tracing::info!(error = %e, "Session refresh failed, signing out locally");
                if e.is_backend_answer() {
                    store::clear_pair(session).await?;
                }
                return Ok(None);
            }
        }
    }

    match backend.get_user(&pair.session.access_token).await {
        Ok(user) => {
            if user != pair.user {
                pair.user = user;
                store::save_pair(session, &pair).await?;
            }
            Ok(Some(pair))
        }
        Err(e) if e.is_backend_answer() => {
            tracing::info!(error = %e, "Stored session no longer valid");
            store::clear_pair(session).await?;
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not verify session, treating request as anonymous");
            Ok(None)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserState
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::InternalError(anyhow::anyhow!(msg)))?;

        let pair = resolve_pair(app.backend.as_ref(), &session).await?;
        Ok(UserState::from_pair(pair, Some(app.backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MockBackend, RemoteError, RemoteErrorKind};

    fn signed_in(backend: MockBackend) -> (UserState, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let state = UserState::new(
            Some(MockBackend::sample_session()),
            Some(MockBackend::sample_user()),
            Some(backend.clone() as Arc<dyn Backend>),
        );
        (state, backend)
    }

    #[test]
    fn replace_state_is_visible_immediately() {
        let mut state = UserState::default();
        assert!(!state.is_authenticated());

        let session = MockBackend::sample_session();
        let user = MockBackend::sample_user();
        state.replace_state(Some(session.clone()), Some(user.clone()), None);

        assert_eq!(state.session(), Some(&session));
        assert_eq!(state.user(), Some(&user));
        assert!(state.backend().is_none());

        state.replace_state(None, None, None);
        assert!(state.session().is_none());
        assert!(state.user().is_none());
    }

    #[tokio::test]
    async fn register_without_backend_is_service_unavailable() {
        let state = UserState::new(
            Some(MockBackend::sample_session()),
            Some(MockBackend::sample_user()),
            None,
        );

        let err = state.register("7").await.unwrap_err();
        assert_eq!(err, RegistrationError::ServiceUnavailable);
    }

    #[tokio::test]
    async fn register_without_identity_asks_to_log_in() {
        let backend = Arc::new(MockBackend::new());
        let handle = backend.clone() as Arc<dyn Backend>;

        let no_user = UserState::new(Some(MockBackend::sample_session()), None, Some(handle.clone()));
        let no_session = UserState::new(None, Some(MockBackend::sample_user()), Some(handle));

        for state in [no_user, no_session] {
            let err = state.register("7").await.unwrap_err();
            assert_eq!(err, RegistrationError::Unauthenticated);
            assert!(err.toast().message.contains("Please log in"));
        }
        assert_eq!(backend.call_count("insert"), 0);
    }

    #[tokio::test]
    async fn register_surfaces_backend_message() {
        let (state, backend) = signed_in(MockBackend {
            insert_result: Some(Err(RemoteError::rejected(
                "duplicate key value violates unique constraint \"registrations_event_user_key\"",
            )
            .with_status(409))),
            ..MockBackend::default()
        });

        let err = state.register("7").await.unwrap_err();

        assert_eq!(
            err,
            RegistrationError::RemoteRejected(
                "duplicate key value violates unique constraint \"registrations_event_user_key\""
                    .to_string()
            )
        );
        assert_eq!(
            err.toast().message,
            "Failed to register: duplicate key value violates unique constraint \"registrations_event_user_key\""
        );
        assert_eq!(backend.call_count("insert"), 1);
    }

    #[tokio::test]
    async fn register_with_no_row_is_empty_result() {
        let (state, _) = signed_in(MockBackend {
            insert_result: Some(Ok(Vec::new())),
            ..MockBackend::default()
        });

        assert_eq!(
            state.register("7").await.unwrap_err(),
            RegistrationError::EmptyResult
        );
    }

    #[tokio::test]
    async fn transport_failure_is_unexpected() {
        let (state, _) = signed_in(MockBackend {
            insert_result: Some(Err(RemoteError::new(
                RemoteErrorKind::Transport,
                "connection refused",
            ))),
            ..MockBackend::default()
        });

        let err = state.register("7").await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unexpected(_)));
        assert_eq!(err.toast().message, "An error occurred during registration.");
    }

    #[tokio::test]
    async fn register_inserts_pending_row_for_current_user() {
        let (state, backend) = signed_in(MockBackend::default());

        let registration = state.register("7").await.unwrap();

        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert_eq!(registration.user_id, MockBackend::sample_user().id);

        let inserted = backend.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].0, REGISTRATIONS_TABLE);
        assert_eq!(inserted[0].1["status"], "pending");
        assert_eq!(inserted[0].1["event_id"], "7");
    }

    #[tokio::test]
    async fn log_out_is_best_effort_and_keeps_snapshot() {
        let (state, backend) = signed_in(MockBackend {
            sign_out_error: Some(RemoteError::new(RemoteErrorKind::Transport, "timeout")),
            ..MockBackend::default()
        });

        state.log_out().await;

        assert_eq!(backend.call_count("sign_out"), 1);
        assert!(state.is_authenticated());
    }

    #[tokio::test]
    async fn anonymous_log_out_makes_no_call() {
        let backend = Arc::new(MockBackend::new());
        let state = UserState::new(None, None, Some(backend.clone() as Arc<dyn Backend>));

        state.log_out().await;

        assert!(backend.calls().is_empty());
    }
}
