use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key assigned by the store; either a bigint identity or a uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(id) => write!(f, "{}", id),
            RowId::Text(id) => f.write_str(id),
        }
    }
}

/// Row of the `events` relation. Owned by the backend, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: RowId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn starts_at_display(&self) -> String {
        self.starts_at
            .map(|at| at.format("%a %d %b %Y, %H:%M UTC").to_string())
            .unwrap_or_else(|| "Date to be announced".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }
}

/// Insert payload for `registrations`; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRegistration {
    pub event_id: String,
    pub user_id: String,
    pub status: RegistrationStatus,
}

/// Persisted row of the `registrations` relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RowId,
    pub event_id: RowId,
    pub user_id: String,
    pub status: RegistrationStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_accept_numbers_and_uuids() {
        let numeric: RowId = serde_json::from_value(serde_json::json!(42)).unwrap();
        let uuid: RowId =
            serde_json::from_value(serde_json::json!("3f6c2a9e-0d3b-4c7e-9f0e-5b1a2c3d4e5f"))
                .unwrap();

        assert_eq!(numeric, RowId::Int(42));
        assert_eq!(uuid.to_string(), "3f6c2a9e-0d3b-4c7e-9f0e-5b1a2c3d4e5f");
    }

    #[test]
    fn registration_status_is_lowercase_on_the_wire() {
        let row = NewRegistration {
            event_id: "7".to_string(),
            user_id: "u-1".to_string(),
            status: RegistrationStatus::Pending,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn event_without_start_shows_placeholder() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Rust meetup"
        }))
        .unwrap();

        assert_eq!(event.starts_at_display(), "Date to be announced");
    }
}
