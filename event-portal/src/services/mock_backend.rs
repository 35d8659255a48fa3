use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::models::{AppMetadata, AuthSession, Credentials, User};
use crate::services::backend::{
    AuthResponse, Backend, OAuthStart, RemoteError, RemoteErrorKind, RemoteResult,
};

pub const MOCK_CODE_VERIFIER: &str = "mock-code-verifier";

/// In-process backend for tests and local development.
///
/// Every call is recorded by operation name so tests can assert that a code
/// path never reached the backend. Responses are configured through the
/// public fields before the mock is shared.
#[derive(Default)]
pub struct MockBackend {
    /// Identity returned by sign-in, sign-up, `get_user` and code exchange.
    pub user: Option<User>,
    /// Session returned by sign-in and code exchange.
    pub session: Option<AuthSession>,
    /// Sign-up also returns `session` (auto-confirm).
    pub auto_confirm: bool,
    pub sign_in_error: Option<RemoteError>,
    pub sign_up_error: Option<RemoteError>,
    pub get_user_error: Option<RemoteError>,
    pub oauth_error: Option<RemoteError>,
    pub exchange_error: Option<RemoteError>,
    pub refresh_error: Option<RemoteError>,
    pub sign_out_error: Option<RemoteError>,
    /// Overrides the default insert behaviour of echoing the row back.
    pub insert_result: Option<RemoteResult<Vec<Value>>>,
    pub select_result: Option<RemoteResult<Vec<Value>>>,
    pub log: CallLog,
}

/// What the mock was asked to do, in order.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
    inserted: Mutex<Vec<(String, Value)>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that knows `sample_user` with a live `sample_session`.
    pub fn signed_in() -> Self {
        Self {
            user: Some(Self::sample_user()),
            session: Some(Self::sample_session()),
            ..Self::default()
        }
    }

    pub fn sample_user() -> User {
        User {
            id: "5d9c1e4a-7b2f-4c61-8e3a-0f4b6d2a9c17".to_string(),
            email: Some("member@example.com".to_string()),
            app_metadata: AppMetadata {
                provider: Some("email".to_string()),
                providers: vec!["email".to_string()],
            },
            user_metadata: Value::Null,
            created_at: None,
        }
    }

    pub fn sample_session() -> AuthSession {
        AuthSession {
            access_token: "mock-access-token".to_string(),
            refresh_token: "mock-refresh-token".to_string(),
            token_type: "bearer".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        guard(&self.log.calls).clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        guard(&self.log.calls)
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    /// Rows passed to `insert`, with their table.
    pub fn inserted(&self) -> Vec<(String, Value)> {
        guard(&self.log.inserted).clone()
    }

    fn record(&self, operation: &str) {
        guard(&self.log.calls).push(operation.to_string());
    }

    fn signed_in_pair(&self) -> RemoteResult<(AuthSession, User)> {
        match (&self.session, &self.user) {
            (Some(session), Some(user)) => Ok((session.clone(), user.clone())),
            _ => Err(RemoteError::rejected("No session configured")),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_user(&self, _access_token: &str) -> RemoteResult<User> {
        self.record("get_user");
        if let Some(err) = &self.get_user_error {
            return Err(err.clone());
        }
        self.user.clone().ok_or_else(|| {
            RemoteError::new(RemoteErrorKind::Unauthorized, "invalid JWT").with_status(401)
        })
    }

    async fn sign_in_with_password(&self, _credentials: &Credentials) -> RemoteResult<AuthResponse> {
        self.record("sign_in_with_password");
        if let Some(err) = &self.sign_in_error {
            return Err(err.clone());
        }
        Ok(AuthResponse {
            user: self.user.clone(),
            session: self.session.clone(),
        })
    }

    async fn sign_up(&self, _credentials: &Credentials) -> RemoteResult<AuthResponse> {
        self.record("sign_up");
        if let Some(err) = &self.sign_up_error {
            return Err(err.clone());
        }
        Ok(AuthResponse {
            user: self.user.clone(),
            session: self.session.clone().filter(|_| self.auto_confirm),
        })
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> RemoteResult<OAuthStart> {
        self.record("sign_in_with_oauth");
        if let Some(err) = &self.oauth_error {
            return Err(err.clone());
        }
        Ok(OAuthStart {
            url: format!(
                "https://auth.mock.test/authorize?provider={}&redirect_to={}",
                provider, redirect_to
            ),
            code_verifier: MOCK_CODE_VERIFIER.to_string(),
        })
    }

    async fn exchange_code_for_session(
        &self,
        _auth_code: &str,
        code_verifier: &str,
    ) -> RemoteResult<(AuthSession, User)> {
        self.record("exchange_code_for_session");
        if let Some(err) = &self.exchange_error {
            return Err(err.clone());
        }
        if code_verifier != MOCK_CODE_VERIFIER {
            return Err(RemoteError::rejected("code challenge does not match previously saved code verifier")
                .with_status(400));
        }
        self.signed_in_pair()
    }

    async fn refresh_session(&self, _refresh_token: &str) -> RemoteResult<(AuthSession, User)> {
        self.record("refresh_session");
        if let Some(err) = &self.refresh_error {
            return Err(err.clone());
        }
        let (mut session, user) = self.signed_in_pair()?;
        session.access_token = format!("{}-refreshed", session.access_token);
        session.expires_at = chrono::Utc::now().timestamp() + 3600;
        Ok((session, user))
    }

    async fn sign_out(&self, _access_token: &str) -> RemoteResult<()> {
        self.record("sign_out");
        match &self.sign_out_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        _access_token: Option<&str>,
    ) -> RemoteResult<Vec<Value>> {
        self.record("insert");
        guard(&self.log.inserted).push((table.to_string(), row.clone()));

        if let Some(result) = &self.insert_result {
            return result.clone();
        }

        let mut stored = row;
        if let Some(fields) = stored.as_object_mut() {
            fields.insert("id".to_string(), Value::from(1));
            fields.insert(
                "created_at".to_string(),
                Value::from(chrono::Utc::now().to_rfc3339()),
            );
        }
        Ok(vec![stored])
    }

    async fn select(
        &self,
        _table: &str,
        _columns: &str,
        _access_token: Option<&str>,
    ) -> RemoteResult<Vec<Value>> {
        self.record("select");
        self.select_result.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}
