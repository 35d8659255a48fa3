use askama::Template;
use axum::{extract::Query, response::IntoResponse};
use serde::Deserialize;
use tower_sessions::Session;

use crate::flash::{take_toasts, Toast};
use crate::state::UserState;

pub const OAUTH_SUCCESS_MESSAGE: &str = "OAuth sign-in successful";

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub user_name: Option<String>,
    pub toasts: Vec<Toast>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub oauth: Option<String>,
}

pub async fn index(
    user: UserState,
    session: Session,
    Query(params): Query<IndexParams>,
) -> impl IntoResponse {
    let mut toasts = take_toasts(&session).await;
    if params.oauth.as_deref() == Some("true") {
        toasts.push(Toast::success(OAUTH_SUCCESS_MESSAGE));
    }

    IndexTemplate {
        user_name: user.user().map(|u| u.display_name()),
        toasts,
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
