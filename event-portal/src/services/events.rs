//! Read side of the `events` relation.

use crate::models::Event;
use crate::services::backend::{Backend, EVENTS_TABLE};

/// Fetch every event. A failing backend yields an empty list so the page
/// still renders; rows that do not decode are skipped.
pub async fn load_events(backend: &dyn Backend, access_token: Option<&str>) -> Vec<Event> {
    let rows = match backend.select(EVENTS_TABLE, "*", access_token).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Error fetching events");
            return Vec::new();
        }
    };

    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Event>(row) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed event row");
                None
            }
        })
        .collect()
}
