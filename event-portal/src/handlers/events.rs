use askama::Template;
use axum::{extract::Path, response::Redirect};
use service_core::error::AppError;
use tower_sessions::Session;

use crate::flash::{push_toast, take_toasts, Toast};
use crate::models::Event;
use crate::services::events::load_events;
use crate::services::metrics::record_registration;
use crate::state::user_state::REGISTERED_MESSAGE;
use crate::state::UserState;

#[derive(Template)]
#[template(path = "events.html")]
pub struct EventsTemplate {
    pub user_name: Option<String>,
    pub toasts: Vec<Toast>,
    pub events: Vec<Event>,
    pub authenticated: bool,
}

pub async fn list_events(user: UserState, session: Session) -> EventsTemplate {
    let events = match user.backend() {
        Some(backend) => load_events(backend.as_ref(), user.access_token()).await,
        None => Vec::new(),
    };

    EventsTemplate {
        user_name: user.user().map(|u| u.display_name()),
        toasts: take_toasts(&session).await,
        events,
        authenticated: user.is_authenticated(),
    }
}

/// Register the signed-in user and report the outcome as a toast on `/events`.
pub async fn register_for_event(
    user: UserState,
    session: Session,
    Path(event_id): Path<String>,
) -> Result<Redirect, AppError> {
    let toast = match user.register(&event_id).await {
        Ok(_) => {
            record_registration("success");
            Toast::success(REGISTERED_MESSAGE)
        }
        Err(e) => {
            record_registration(e.outcome());
            e.toast()
        }
    };

    push_toast(&session, toast).await?;
    Ok(Redirect::to("/events"))
}
