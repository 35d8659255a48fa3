//! HTTP client for the hosted backend: GoTrue-style auth endpoints under
//! `/auth/v1` and PostgREST-style table endpoints under `/rest/v1`.

use crate::config::BackendSettings;
use crate::models::{AuthSession, Credentials, User};
use crate::services::backend::{
    AuthResponse, Backend, OAuthStart, RemoteError, RemoteErrorKind, RemoteResult,
};
use crate::utils::pkce;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;

pub struct BackendClient {
    client: Client,
    settings: BackendSettings,
}

/// Token endpoint payload: a session with its user embedded.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_pair(self) -> (AuthSession, User) {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp() + self.expires_in);

        (
            AuthSession {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                token_type: self.token_type,
                expires_at,
            },
            self.user,
        )
    }
}

/// Sign-up answers with a full session when auto-confirm is on, otherwise
/// with the bare (unconfirmed) user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Pull a human-readable message out of an auth or table error body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected backend response")
                .to_string()
        })
}

fn error_kind(status: StatusCode) -> RemoteErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteErrorKind::Unauthorized,
        _ => RemoteErrorKind::Rejected,
    }
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build backend HTTP client: {}", e))?;

        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        self.settings.url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Attach the project key, and the user's token when there is one.
    fn authorize(&self, request: TracedRequest, access_token: Option<&str>) -> TracedRequest {
        let anon_key = self.settings.anon_key.expose_secret().as_str();
        request
            .header("apikey", anon_key)
            .bearer_auth(access_token.unwrap_or(anon_key))
    }

    async fn send(&self, request: TracedRequest, url: &str) -> RemoteResult<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to reach backend at {}: {}", url, e);
            RemoteError::new(RemoteErrorKind::Transport, format!("HTTP request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::warn!(status = %status, url = %url, message = %message, "Backend rejected request");

        Err(RemoteError::new(error_kind(status), message).with_status(status.as_u16()))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to decode backend response: {}", e);
            RemoteError::new(RemoteErrorKind::Decode, format!("Invalid backend response: {}", e))
                .with_status(status)
        })
    }

    async fn token_grant<B: Serialize + Sync + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> RemoteResult<(AuthSession, User)> {
        let url = self.url("/auth/v1/token");
        let request = self.authorize(
            self.client
                .traced_post(&url)
                .query(&[("grant_type", grant_type)])
                .json(body),
            None,
        );

        let response = self.send(request, &url).await?;
        let tokens: TokenResponse = Self::read_json(response).await?;
        Ok(tokens.into_pair())
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn get_user(&self, access_token: &str) -> RemoteResult<User> {
        let url = self.url("/auth/v1/user");
        let request = self.authorize(self.client.traced_get(&url), Some(access_token));

        let response = self.send(request, &url).await?;
        Self::read_json(response).await
    }

    #[tracing::instrument(skip_all)]
    async fn sign_in_with_password(&self, credentials: &Credentials) -> RemoteResult<AuthResponse> {
        let (session, user) = self
            .token_grant("password", credentials)
            .await?;

        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    #[tracing::instrument(skip_all)]
    async fn sign_up(&self, credentials: &Credentials) -> RemoteResult<AuthResponse> {
        let url = self.url("/auth/v1/signup");
        let request = self.authorize(self.client.traced_post(&url).json(credentials), None);

        let response = self.send(request, &url).await?;
        let payload: SignUpResponse = Self::read_json(response).await?;

        Ok(match payload {
            SignUpResponse::Session(tokens) => {
                let (session, user) = tokens.into_pair();
                AuthResponse {
                    user: Some(user),
                    session: Some(session),
                }
            }
            SignUpResponse::User(user) => AuthResponse {
                user: Some(user),
                session: None,
            },
        })
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> RemoteResult<OAuthStart> {
        let code_verifier = pkce::generate_verifier();
        let code_challenge = pkce::challenge_for(&code_verifier);

        let url = Url::parse_with_params(
            &self.url("/auth/v1/authorize"),
            &[
                ("provider", provider),
                ("redirect_to", redirect_to),
                ("code_challenge", code_challenge.as_str()),
                ("code_challenge_method", "s256"),
            ],
        )
        .map_err(|e| {
            tracing::error!("Invalid backend URL {}: {}", self.settings.url, e);
            RemoteError::new(RemoteErrorKind::Transport, format!("Invalid backend URL: {}", e))
        })?;

        Ok(OAuthStart {
            url: url.to_string(),
            code_verifier,
        })
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> RemoteResult<(AuthSession, User)> {
        self.token_grant(
            "pkce",
            &serde_json::json!({
                "auth_code": auth_code,
                "code_verifier": code_verifier,
            }),
        )
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> RemoteResult<(AuthSession, User)> {
        self.token_grant(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> RemoteResult<()> {
        let url = self.url("/auth/v1/logout");
        let request = self.authorize(self.client.traced_post(&url), Some(access_token));

        self.send(request, &url).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, row, access_token))]
    async fn insert(
        &self,
        table: &str,
        row: serde_json::Value,
        access_token: Option<&str>,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        let url = self.url(&format!("/rest/v1/{}", table));
        let request = self.authorize(
            self.client
                .traced_post(&url)
                .header("Prefer", "return=representation")
                .json(&row),
            access_token,
        );

        let response = self.send(request, &url).await?;
        Self::read_json(response).await
    }

    #[tracing::instrument(skip(self, access_token))]
    async fn select(
        &self,
        table: &str,
        columns: &str,
        access_token: Option<&str>,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        let url = self.url(&format!("/rest/v1/{}", table));
        let request = self.authorize(
            self.client.traced_get(&url).query(&[("select", columns)]),
            access_token,
        );

        let response = self.send(request, &url).await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn client() -> BackendClient {
        BackendClient::new(BackendSettings {
            url: "https://project.example.co/".to_string(),
            anon_key: Secret::new("anon".to_string()),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn password_grant_body_is_the_credentials() {
        let credentials = Credentials {
            email: "member@example.com".to_string(),
            password: "Str0ng!Pass".to_string(),
        };

        let body = serde_json::to_value(&credentials).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "email": "member@example.com", "password": "Str0ng!Pass" })
        );
    }

    #[test]
    fn auth_error_message_prefers_msg() {
        let body = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Invalid login credentials"
        );
    }

    #[test]
    fn legacy_auth_error_uses_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#;
        assert_eq!(error_message(StatusCode::BAD_REQUEST, body), "Email not confirmed");
    }

    #[test]
    fn table_error_uses_message() {
        let body = r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint \"registrations_pkey\""}"#;
        assert!(error_message(StatusCode::CONFLICT, body).starts_with("duplicate key value"));
    }

    #[test]
    fn unparseable_body_falls_back_to_status() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>upstream down</html>"),
            "Bad Gateway"
        );
    }

    #[test]
    fn unauthorized_statuses_are_classified() {
        assert_eq!(error_kind(StatusCode::UNAUTHORIZED), RemoteErrorKind::Unauthorized);
        assert_eq!(error_kind(StatusCode::FORBIDDEN), RemoteErrorKind::Unauthorized);
        assert_eq!(error_kind(StatusCode::CONFLICT), RemoteErrorKind::Rejected);
    }

    #[test]
    fn signup_without_confirmation_yields_bare_user() {
        let payload = serde_json::json!({
            "id": "0b8e4d0a-2f7c-4d53-a1b4-1c9f3e2d7a60",
            "email": "new@example.com",
            "app_metadata": { "provider": "email", "providers": ["email"] },
            "user_metadata": {}
        });

        let parsed: SignUpResponse = serde_json::from_value(payload).unwrap();
        assert!(matches!(parsed, SignUpResponse::User(_)));
    }

    #[test]
    fn token_response_derives_expiry_when_absent() {
        let tokens: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": "u-1" }
        }))
        .unwrap();

        let before = chrono::Utc::now().timestamp();
        let (session, user) = tokens.into_pair();
        assert!(session.expires_at >= before + 3600);
        assert_eq!(user.id, "u-1");
    }

    #[tokio::test]
    async fn oauth_url_carries_pkce_challenge() {
        let start = client()
            .sign_in_with_oauth("github", "http://localhost:8080/auth/login/callback")
            .await
            .unwrap();

        let url = Url::parse(&start.url).unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["provider"], "github");
        assert_eq!(
            params["redirect_to"],
            "http://localhost:8080/auth/login/callback"
        );
        assert_eq!(params["code_challenge_method"], "s256");
        assert_eq!(
            params["code_challenge"],
            pkce::challenge_for(&start.code_verifier)
        );
    }
}
