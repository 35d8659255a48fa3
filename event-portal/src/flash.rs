//! One-shot toast notifications carried across a redirect in the session.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const TOASTS_KEY: &str = "toasts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    /// CSS class used by the templates.
    pub fn css_class(&self) -> &'static str {
        match self.level {
            ToastLevel::Success => "toast toast-success",
            ToastLevel::Error => "toast toast-error",
            ToastLevel::Info => "toast toast-info",
        }
    }
}

pub async fn push_toast(session: &Session, toast: Toast) -> anyhow::Result<()> {
    let mut toasts: Vec<Toast> = session.get(TOASTS_KEY).await?.unwrap_or_default();
    toasts.push(toast);
    session.insert(TOASTS_KEY, toasts).await?;
    Ok(())
}

/// Drain pending toasts. A broken session store yields none rather than an error page.
pub async fn take_toasts(session: &Session) -> Vec<Toast> {
    match session.remove::<Vec<Toast>>(TOASTS_KEY).await {
        Ok(toasts) => toasts.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read toasts from session");
            Vec::new()
        }
    }
}
