use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use service_core::error::AppError;
use std::fmt;
use std::str::FromStr;
use tower_sessions::Session;

use crate::config::AuthSettings;
use crate::flash::{take_toasts, Toast};
use crate::forms::{FormState, LoginForm, OAuthForm, RegisterForm};
use crate::models::SessionPair;
use crate::services::metrics::record_auth_attempt;
use crate::services::AuthResponse;
use crate::state::{store, UserState};
use crate::AppState;

use super::stored_user_name;

pub const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";
pub const OAUTH_SUCCESS_PATH: &str = "/?oauth=true";

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful! Welcome back.";
pub const REGISTER_SUCCESS_MESSAGE: &str = "Registration successful! Welcome to our platform.";
const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again";
const REGISTER_FAILED_MESSAGE: &str = "Registration failed. Please try again";
const UNEXPECTED_MESSAGE: &str = "Unexpected error";

/// The only two values accepted in the `:authtype` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Login,
    Register,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Login => "login",
            AuthType::Register => "register",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(AuthType::Login),
            "register" => Ok(AuthType::Register),
            other => Err(AppError::NotFound(anyhow::anyhow!(
                "Unknown auth page: {}",
                other
            ))),
        }
    }
}

#[derive(Template)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub authtype: String,
    pub user_name: Option<String>,
    pub toasts: Vec<Toast>,
    pub providers: Vec<String>,
    pub login_form: FormState,
    pub register_form: FormState,
    pub oauth_form: FormState,
}

impl AuthTemplate {
    fn new(authtype: AuthType, auth: &AuthSettings) -> Self {
        Self {
            authtype: authtype.to_string(),
            user_name: None,
            toasts: Vec::new(),
            providers: auth.oauth_providers.clone(),
            login_form: FormState::default(),
            register_form: FormState::default(),
            oauth_form: FormState::default(),
        }
    }

    async fn for_session(authtype: AuthType, auth: &AuthSettings, session: &Session) -> Self {
        let mut page = Self::new(authtype, auth);
        page.user_name = stored_user_name(session).await;
        page.toasts = take_toasts(session).await;
        page
    }

    fn respond(self, status: StatusCode) -> Response {
        (status, self).into_response()
    }
}

pub async fn auth_page(
    State(state): State<AppState>,
    Path(authtype): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let authtype: AuthType = authtype.parse()?;
    let page = AuthTemplate::for_session(authtype, &state.auth, &session).await;
    Ok(page.respond(StatusCode::OK))
}

/// How a password sign-in or sign-up attempt ended.
enum Attempt {
    Succeeded(FormState),
    Rejected(FormState),
    Failed(FormState),
}

impl Attempt {
    fn outcome(&self) -> &'static str {
        match self {
            Attempt::Succeeded(_) => "success",
            Attempt::Rejected(_) => "rejected",
            Attempt::Failed(_) => "error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Attempt::Succeeded(_) => StatusCode::OK,
            Attempt::Rejected(_) => StatusCode::BAD_REQUEST,
            Attempt::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_form(self) -> FormState {
        match self {
            Attempt::Succeeded(form) | Attempt::Rejected(form) | Attempt::Failed(form) => form,
        }
    }
}

/// Classify a backend answer to a password flow and store any session it carries.
async fn settle(
    session: &Session,
    email: String,
    result: crate::services::RemoteResult<AuthResponse>,
    success_message: &str,
    missing_user_message: &str,
) -> Result<Attempt, AppError> {
    let mut form = FormState::with_email(email);

    match result {
        Ok(AuthResponse {
            user: Some(user),
            session: tokens,
        }) => {
            match tokens {
                Some(tokens) => {
                    let pair = SessionPair {
                        session: tokens,
                        user,
                    };
                    store::begin_authenticated(session, &pair).await?;
                    tracing::info!(user_id = %pair.user.id, "User signed in");
                }
                None => {
                    tracing::info!(user_id = %user.id, "Account created, awaiting email confirmation");
                }
            }
            form.message = Some(success_message.to_string());
            Ok(Attempt::Succeeded(form))
        }
        Ok(AuthResponse { user: None, .. }) => {
            form.add_error("email", missing_user_message);
            Ok(Attempt::Rejected(form))
        }
        Err(e) if e.is_backend_answer() => {
            tracing::info!(error = %e, "Backend rejected credentials");
            form.add_error("email", e.message);
            Ok(Attempt::Rejected(form))
        }
        Err(e) => {
            tracing::error!(error = %e, "Auth request failed");
            form.error = Some(UNEXPECTED_MESSAGE.to_string());
            Ok(Attempt::Failed(form))
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Path(authtype): Path<String>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let authtype: AuthType = authtype.parse()?;
    let mut page = AuthTemplate::for_session(authtype, &state.auth, &session).await;

    let credentials = match form.into_credentials() {
        Ok(credentials) => credentials,
        Err(invalid) => {
            record_auth_attempt("login", "invalid");
            page.login_form = invalid;
            return Ok(page.respond(StatusCode::BAD_REQUEST));
        }
    };

    let result = state.backend.sign_in_with_password(&credentials).await;
    let attempt = settle(
        &session,
        credentials.email,
        result,
        LOGIN_SUCCESS_MESSAGE,
        LOGIN_FAILED_MESSAGE,
    )
    .await?;

    record_auth_attempt("login", attempt.outcome());
    let status = attempt.status();
    if let Attempt::Succeeded(_) = attempt {
        page.user_name = stored_user_name(&session).await;
    }
    page.login_form = attempt.into_form();
    Ok(page.respond(status))
}

pub async fn register(
    State(state): State<AppState>,
    Path(authtype): Path<String>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let authtype: AuthType = authtype.parse()?;
    let mut page = AuthTemplate::for_session(authtype, &state.auth, &session).await;

    let credentials = match form.into_credentials() {
        Ok(credentials) => credentials,
        Err(invalid) => {
            record_auth_attempt("register", "invalid");
            page.register_form = invalid;
            return Ok(page.respond(StatusCode::BAD_REQUEST));
        }
    };

    let result = state.backend.sign_up(&credentials).await;
    let attempt = settle(
        &session,
        credentials.email,
        result,
        REGISTER_SUCCESS_MESSAGE,
        REGISTER_FAILED_MESSAGE,
    )
    .await?;

    record_auth_attempt("register", attempt.outcome());
    let status = attempt.status();
    if let Attempt::Succeeded(_) = attempt {
        page.user_name = stored_user_name(&session).await;
    }
    page.register_form = attempt.into_form();
    Ok(page.respond(status))
}

/// Start a provider sign-in: keep the PKCE verifier and send the browser off.
pub async fn oauth(
    State(state): State<AppState>,
    Path(authtype): Path<String>,
    session: Session,
    Form(form): Form<OAuthForm>,
) -> Result<Response, AppError> {
    let authtype: AuthType = authtype.parse()?;

    let provider = match form.into_provider() {
        Ok(provider) => provider,
        Err(invalid) => {
            record_auth_attempt("oauth", "invalid");
            let mut page = AuthTemplate::for_session(authtype, &state.auth, &session).await;
            page.oauth_form = invalid;
            return Ok(page.respond(StatusCode::BAD_REQUEST));
        }
    };

    let redirect_to = state.auth.callback_url(authtype.as_str());
    match state.backend.sign_in_with_oauth(&provider, &redirect_to).await {
        Ok(start) => {
            store::store_verifier(&session, &start.code_verifier).await?;
            record_auth_attempt("oauth", "redirected");
            tracing::info!(provider = %provider, "Redirecting to identity provider");
            Ok(Redirect::to(&start.url).into_response())
        }
        Err(e) => {
            record_auth_attempt("oauth", "rejected");
            tracing::warn!(provider = %provider, error = %e, "Could not start OAuth sign-in");
            let mut page = AuthTemplate::for_session(authtype, &state.auth, &session).await;
            page.oauth_form.add_error("provider", e.message);
            Ok(page.respond(StatusCode::BAD_REQUEST))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
}

/// Provider redirect target: trade the code for a session.
pub async fn callback(
    State(state): State<AppState>,
    Path(authtype): Path<String>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    let _: AuthType = authtype.parse()?;

    let code = params.code.filter(|code| !code.is_empty());
    let verifier = store::take_verifier(&session).await?;

    match (code, verifier) {
        (Some(code), Some(verifier)) => {
            match state.backend.exchange_code_for_session(&code, &verifier).await {
                Ok((tokens, user)) => {
                    let pair = SessionPair {
                        session: tokens,
                        user,
                    };
                    store::begin_authenticated(&session, &pair).await?;
                    record_auth_attempt("oauth_callback", "success");
                    tracing::info!(user_id = %pair.user.id, provider = pair.user.provider(), "OAuth sign-in completed");
                    return Ok(Redirect::to(OAUTH_SUCCESS_PATH));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Code exchange failed");
                }
            }
        }
        (None, _) => tracing::warn!("OAuth callback without a code"),
        (Some(_), None) => tracing::warn!("OAuth callback without a stored verifier"),
    }

    record_auth_attempt("oauth_callback", "error");
    Ok(Redirect::to(AUTH_CODE_ERROR_PATH))
}

#[derive(Template)]
#[template(path = "auth_code_error.html")]
pub struct AuthCodeErrorTemplate {
    pub user_name: Option<String>,
    pub toasts: Vec<Toast>,
}

pub async fn auth_code_error() -> AuthCodeErrorTemplate {
    AuthCodeErrorTemplate {
        user_name: None,
        toasts: Vec::new(),
    }
}

/// Revoke at the backend (best effort), then forget the browser session.
pub async fn logout(user: UserState, session: Session) -> Result<Redirect, AppError> {
    user.log_out().await;
    session
        .flush()
        .await
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_login_and_register_are_auth_pages() {
        assert_eq!("login".parse::<AuthType>().unwrap(), AuthType::Login);
        assert_eq!("register".parse::<AuthType>().unwrap(), AuthType::Register);

        for other in ["", "Login", "signup", "callback", "login/"] {
            let err = other.parse::<AuthType>().unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{:?}", other);
        }
    }
}
