//! Shared helpers for event-portal router tests.
//!
//! The router is built around a `MockBackend`; requests are driven with
//! `oneshot` and the session cookie is carried by hand between them.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use event_portal::{
    config::AuthSettings,
    services::MockBackend,
    startup::{build_router, SessionOptions},
    AppState,
};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const SITE_URL: &str = "http://portal.test";

pub const VALID_PASSWORD: &str = "Str0ng!Pass";

pub struct TestApp {
    pub router: Router,
    pub backend: Arc<MockBackend>,
    /// `name=value` of the most recent session cookie.
    pub cookie: Option<String>,
}

impl TestApp {
    pub fn new(backend: MockBackend) -> Self {
        Self::with_providers(backend, &["github", "google"])
    }

    pub fn with_providers(backend: MockBackend, providers: &[&str]) -> Self {
        let backend = Arc::new(backend);
        let auth = AuthSettings {
            site_url: SITE_URL.to_string(),
            oauth_providers: providers.iter().map(|p| p.to_string()).collect(),
        };
        let state = AppState::new(backend.clone(), auth);

        Self {
            router: build_router(state, SessionOptions::default()),
            backend,
            cookie: None,
        }
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = self.with_cookie(Request::builder().uri(uri));
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) -> Response<Body> {
        let body = serde_urlencoded::to_string(form).unwrap();

        let request = self.with_cookie(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
        );
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    /// Sign in through the login form; the mock decides whether it succeeds.
    pub async fn log_in(&mut self) -> Response<Body> {
        self.post_form(
            "/auth/login/login",
            &[("email", "member@example.com"), ("password", VALID_PASSWORD)],
        )
        .await
    }

    fn with_cookie(&self, builder: axum::http::request::Builder) -> axum::http::request::Builder {
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(pair) = set_cookie.split(';').next() {
                self.cookie = Some(pair.trim().to_string());
            }
        }

        response
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
