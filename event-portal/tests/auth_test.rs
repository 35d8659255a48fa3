mod common;

use axum::http::StatusCode;
use common::{body_text, location, TestApp, SITE_URL, VALID_PASSWORD};
use event_portal::services::{MockBackend, RemoteError, RemoteErrorKind};

#[tokio::test]
async fn auth_pages_render_for_login_and_register() {
    let mut app = TestApp::new(MockBackend::new());

    let login = app.get("/auth/login").await;
    assert_eq!(login.status(), StatusCode::OK);
    let body = body_text(login).await;
    assert!(body.contains("action=\"/auth/login/login\""));
    assert!(body.contains("value=\"github\""));

    let register = app.get("/auth/register").await;
    assert_eq!(register.status(), StatusCode::OK);
    assert!(body_text(register)
        .await
        .contains("action=\"/auth/register/register\""));
}

#[tokio::test]
async fn unknown_authtype_is_not_found() {
    let mut app = TestApp::new(MockBackend::signed_in());

    assert_eq!(app.get("/auth/signup").await.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_form(
            "/auth/admin/login",
            &[("email", "member@example.com"), ("password", VALID_PASSWORD)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/auth/admin/callback?code=abc").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn invalid_login_is_rejected_without_remote_call() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app
        .post_form(
            "/auth/login/login",
            &[("email", "not-an-email"), ("password", "")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("Please enter a valid email address"));
    assert!(body.contains("Password is required"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn weak_registration_is_rejected_without_remote_call() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let cases = [
        ("short1!", "Password must be at least 8 characters long"),
        ("nouppercase1!", "Password must contain at least one uppercase letter"),
        ("NoSpecial123", "Password must contain at least one special character"),
    ];

    for (password, expected) in cases {
        let response = app
            .post_form(
                "/auth/register/register",
                &[
                    ("email", "new@example.com"),
                    ("password", password),
                    ("confirm_password", password),
                ],
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", password);
        let body = body_text(response).await;
        assert!(body.contains(expected), "{}", password);
        assert!(!body.contains(password), "password echoed back");
    }

    let response = app
        .post_form(
            "/auth/register/register",
            &[
                ("email", "new@example.com"),
                ("password", VALID_PASSWORD),
                ("confirm_password", "Str0ng!Other"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Passwords do not match"));

    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn successful_login_stores_session() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app.log_in().await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("Login successful! Welcome back."));
    assert_eq!(app.backend.call_count("sign_in_with_password"), 1);

    // The stored pair is picked up on the next request.
    let body = body_text(app.get("/").await).await;
    assert!(body.contains("Signed in as member"));
    assert_eq!(app.backend.call_count("get_user"), 1);
}

#[tokio::test]
async fn backend_rejection_is_attached_to_email() {
    let mut app = TestApp::new(MockBackend {
        sign_in_error: Some(RemoteError::rejected("Invalid login credentials").with_status(400)),
        ..MockBackend::signed_in()
    });

    let response = app.log_in().await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("Invalid login credentials"));
    assert!(body.contains("value=\"member@example.com\""));
}

#[tokio::test]
async fn login_without_user_is_a_failure() {
    let mut app = TestApp::new(MockBackend::new());

    let response = app.log_in().await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("Login failed. Please try again"));
}

#[tokio::test]
async fn transport_failure_is_server_error() {
    let mut app = TestApp::new(MockBackend {
        sign_in_error: Some(RemoteError::new(
            RemoteErrorKind::Transport,
            "connection refused",
        )),
        ..MockBackend::signed_in()
    });

    let response = app.log_in().await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("Unexpected error"));
    assert!(!body.contains("connection refused"));
}

#[tokio::test]
async fn registration_without_confirmation_keeps_visitor_anonymous() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app
        .post_form(
            "/auth/register/register",
            &[
                ("email", "New@Example.com"),
                ("password", VALID_PASSWORD),
                ("confirm_password", VALID_PASSWORD),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("Registration successful! Welcome to our platform."));

    let body = body_text(app.get("/").await).await;
    assert!(!body.contains("Signed in as"));
    assert_eq!(app.backend.call_count("get_user"), 0);
}

#[tokio::test]
async fn auto_confirmed_registration_signs_in() {
    let mut app = TestApp::new(MockBackend {
        auto_confirm: true,
        ..MockBackend::signed_in()
    });

    let response = app
        .post_form(
            "/auth/register/register",
            &[
                ("email", "member@example.com"),
                ("password", VALID_PASSWORD),
                ("confirm_password", VALID_PASSWORD),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(app.get("/").await).await;
    assert!(body.contains("Signed in as member"));
}

#[tokio::test]
async fn oauth_with_empty_provider_makes_no_call() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app.post_form("/auth/login/oauth", &[("provider", "")]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Provider is required"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn provider_error_shows_without_configured_buttons() {
    let mut app = TestApp::with_providers(MockBackend::signed_in(), &[]);

    let response = app.post_form("/auth/login/oauth", &[("provider", " ")]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Provider is required"));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn registration_reports_all_password_rules_and_mismatch() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app
        .post_form(
            "/auth/register/register",
            &[
                ("email", "new@example.com"),
                ("password", "abc"),
                ("confirm_password", "abd"),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    for expected in [
        "Password must be at least 8 characters long",
        "Password must contain at least one uppercase letter",
        "Password must contain at least one number",
        "Password must contain at least one special character",
        "Passwords do not match",
    ] {
        assert!(body.contains(expected), "{}", expected);
    }
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn oauth_redirects_to_provider_with_callback_url() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app
        .post_form("/auth/login/oauth", &[("provider", "GitHub")])
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("https://auth.mock.test/authorize?provider=github"));
    assert!(target.contains(&format!("redirect_to={}/auth/login/callback", SITE_URL)));
}

#[tokio::test]
async fn oauth_backend_error_is_attached_to_provider() {
    let mut app = TestApp::new(MockBackend {
        oauth_error: Some(RemoteError::rejected("Unsupported provider: provider is not enabled")),
        ..MockBackend::signed_in()
    });

    let response = app
        .post_form("/auth/register/oauth", &[("provider", "myspace")])
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("Unsupported provider: provider is not enabled"));
}

#[tokio::test]
async fn callback_with_code_completes_sign_in() {
    let mut app = TestApp::new(MockBackend::signed_in());

    app.post_form("/auth/login/oauth", &[("provider", "github")])
        .await;
    let response = app.get("/auth/login/callback?code=abc123").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?oauth=true");
    assert_eq!(app.backend.call_count("exchange_code_for_session"), 1);

    let body = body_text(app.get("/?oauth=true").await).await;
    assert!(body.contains("Signed in as member"));
    assert!(body.contains("OAuth sign-in successful"));
}

#[tokio::test]
async fn callback_without_code_goes_to_error_page() {
    let mut app = TestApp::new(MockBackend::signed_in());

    app.post_form("/auth/login/oauth", &[("provider", "github")])
        .await;
    let response = app.get("/auth/login/callback").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/auth-code-error");
    assert_eq!(app.backend.call_count("exchange_code_for_session"), 0);
}

#[tokio::test]
async fn callback_without_stored_verifier_fails() {
    let mut app = TestApp::new(MockBackend::signed_in());

    let response = app.get("/auth/login/callback?code=abc123").await;

    assert_eq!(location(&response), "/auth/auth-code-error");
    assert_eq!(app.backend.call_count("exchange_code_for_session"), 0);
}

#[tokio::test]
async fn failed_exchange_goes_to_error_page() {
    let mut app = TestApp::new(MockBackend {
        exchange_error: Some(RemoteError::rejected("invalid flow state, no valid flow state found")),
        ..MockBackend::signed_in()
    });

    app.post_form("/auth/login/oauth", &[("provider", "github")])
        .await;
    let response = app.get("/auth/login/callback?code=stale").await;

    assert_eq!(location(&response), "/auth/auth-code-error");

    let page = app.get("/auth/auth-code-error").await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains("could not complete your sign-in"));
}

#[tokio::test]
async fn logout_revokes_and_forgets_session() {
    let mut app = TestApp::new(MockBackend::signed_in());
    app.log_in().await;

    let response = app.get("/logout").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert_eq!(app.backend.call_count("sign_out"), 1);

    let body = body_text(app.get("/").await).await;
    assert!(!body.contains("Signed in as"));
}

#[tokio::test]
async fn expired_session_is_refreshed() {
    let mut expired = MockBackend::sample_session();
    expired.expires_at = chrono::Utc::now().timestamp() - 60;
    let mut app = TestApp::new(MockBackend {
        session: Some(expired),
        ..MockBackend::signed_in()
    });
    app.log_in().await;

    let body = body_text(app.get("/").await).await;

    assert!(body.contains("Signed in as member"));
    assert_eq!(app.backend.call_count("refresh_session"), 1);
}

#[tokio::test]
async fn rejected_refresh_signs_out_locally() {
    let mut expired = MockBackend::sample_session();
    expired.expires_at = chrono::Utc::now().timestamp() - 60;
    let mut app = TestApp::new(MockBackend {
        session: Some(expired),
        refresh_error: Some(
            RemoteError::rejected("Invalid Refresh Token: Already Used").with_status(400),
        ),
        ..MockBackend::signed_in()
    });
    app.log_in().await;

    let body = body_text(app.get("/").await).await;
    assert!(!body.contains("Signed in as"));

    // Stored pair was dropped, so the next request does not retry.
    app.get("/").await;
    assert_eq!(app.backend.call_count("refresh_session"), 1);
}

#[tokio::test]
async fn revoked_token_makes_request_anonymous() {
    let mut app = TestApp::new(MockBackend {
        get_user_error: Some(
            RemoteError::new(RemoteErrorKind::Unauthorized, "invalid JWT").with_status(401),
        ),
        ..MockBackend::signed_in()
    });
    app.log_in().await;

    let body = body_text(app.get("/").await).await;
    assert!(!body.contains("Signed in as"));
}
