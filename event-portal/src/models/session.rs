use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the real expiry at which a session is treated as expired,
/// so a token is never sent that dies in flight.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Tokens issued by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Absolute expiry, unix seconds.
    pub expires_at: i64,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() + EXPIRY_MARGIN_SECS >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Identity record of an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name to greet the user with: provider full name, else the email local part.
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .get("full_name")
            .or_else(|| self.user_metadata.get("name"))
            .and_then(|v| v.as_str())
            .filter(|name| !name.is_empty())
        {
            return name.to_string();
        }

        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }

    pub fn provider(&self) -> &str {
        self.app_metadata.provider.as_deref().unwrap_or("email")
    }
}

/// Session and identity, stored and replaced as one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPair {
    pub session: AuthSession,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
