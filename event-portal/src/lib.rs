pub mod config;
pub mod flash;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod state;
pub mod utils;

use config::AuthSettings;
use services::Backend;
use std::sync::Arc;

/// Shared application state: the backend capability and auth settings.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, auth: AuthSettings) -> Self {
        Self {
            backend,
            auth: Arc::new(auth),
        }
    }
}
