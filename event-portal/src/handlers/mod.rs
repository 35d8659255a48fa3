pub mod app;
pub mod auth;
pub mod events;
pub mod metrics;

use tower_sessions::Session;

use crate::state::store;

/// Greeting name from the stored pair, without a backend round trip.
///
/// Used by pages that only decorate the header; anything that acts on the
/// user's behalf goes through the `UserState` extractor instead.
pub(crate) async fn stored_user_name(session: &Session) -> Option<String> {
    match store::load_pair(session).await {
        Ok(pair) => pair.map(|pair| pair.user.display_name()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored session");
            None
        }
    }
}
