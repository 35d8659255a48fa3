//! Capability interface to the hosted auth/data backend.
//!
//! Everything the portal needs from the backend goes through [`Backend`]:
//! the HTTP implementation lives in [`super::backend_client`], the in-process
//! double used by tests in [`super::mock_backend`].

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::models::{AuthSession, Credentials, User};

pub const REGISTRATIONS_TABLE: &str = "registrations";
pub const EVENTS_TABLE: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Token missing, invalid or expired (401/403).
    Unauthorized,
    /// Backend answered with an error payload.
    Rejected,
    /// The request never produced a response.
    Transport,
    /// A response arrived but could not be understood.
    Decode,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteErrorKind::Unauthorized => "unauthorized",
            RemoteErrorKind::Rejected => "rejected",
            RemoteErrorKind::Transport => "transport",
            RemoteErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} backend error: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Rejected, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The backend itself answered with an error, as opposed to the call failing.
    pub fn is_backend_answer(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Unauthorized | RemoteErrorKind::Rejected
        )
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result of a password sign-in or sign-up. Either part may be absent:
/// sign-up without auto-confirm yields a user but no session.
#[derive(Debug, Clone, Default)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<AuthSession>,
}

/// Where to send the browser to start an OAuth flow, plus the PKCE verifier
/// that must be presented when the code comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthStart {
    pub url: String,
    pub code_verifier: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Validate an access token and return its owner.
    async fn get_user(&self, access_token: &str) -> RemoteResult<User>;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> RemoteResult<AuthResponse>;

    async fn sign_up(&self, credentials: &Credentials) -> RemoteResult<AuthResponse>;

    async fn sign_in_with_oauth(&self, provider: &str, redirect_to: &str)
        -> RemoteResult<OAuthStart>;

    /// Trade an OAuth authorization code for a session and its user.
    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> RemoteResult<(AuthSession, User)>;

    async fn refresh_session(&self, refresh_token: &str) -> RemoteResult<(AuthSession, User)>;

    async fn sign_out(&self, access_token: &str) -> RemoteResult<()>;

    /// Insert one row and return the stored representation.
    async fn insert(
        &self,
        table: &str,
        row: serde_json::Value,
        access_token: Option<&str>,
    ) -> RemoteResult<Vec<serde_json::Value>>;

    async fn select(
        &self,
        table: &str,
        columns: &str,
        access_token: Option<&str>,
    ) -> RemoteResult<Vec<serde_json::Value>>;
}
