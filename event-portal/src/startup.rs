use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ServerSettings;
use crate::handlers::{
    app::{health_check, index},
    auth::{auth_code_error, auth_page, callback, login, logout, oauth, register},
    events::{list_events, register_for_event},
    metrics::metrics,
};
use crate::AppState;

/// Session cookie behaviour, split out of `ServerSettings` so tests can build
/// a router without a full configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub secure: bool,
    pub inactivity_hours: i64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secure: false,
            inactivity_hours: 24,
        }
    }
}

impl From<&ServerSettings> for SessionOptions {
    fn from(server: &ServerSettings) -> Self {
        Self {
            secure: server.secure_cookies,
            inactivity_hours: server.session_inactivity_hours,
        }
    }
}

fn static_dir() -> ServeDir {
    ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

pub fn build_router(state: AppState, sessions: SessionOptions) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(sessions.secure)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            sessions.inactivity_hours,
        )));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/events", get(list_events))
        .route("/events/:event_id/register", post(register_for_event))
        .route("/auth/auth-code-error", get(auth_code_error))
        .route("/auth/:authtype", get(auth_page))
        .route("/auth/:authtype/login", post(login))
        .route("/auth/:authtype/register", post(register))
        .route("/auth/:authtype/oauth", post(oauth))
        .route("/auth/:authtype/callback", get(callback))
        .route("/logout", get(logout))
        .nest_service("/static", static_dir())
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.0.as_str())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
