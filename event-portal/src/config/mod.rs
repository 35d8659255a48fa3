use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`. Must be on behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_inactivity_hours")]
    pub session_inactivity_hours: i64,
}

fn default_session_inactivity_hours() -> i64 {
    24
}

#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Project URL of the hosted backend (e.g. https://abc.supabase.co).
    pub url: String,
    /// Public (anon) API key sent as `apikey` on every request.
    pub anon_key: Secret<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    /// Browser-facing origin of this portal, used to build OAuth callback URLs.
    pub site_url: String,
    /// Providers offered as OAuth buttons on the auth pages.
    #[serde(default = "default_oauth_providers")]
    pub oauth_providers: Vec<String>,
}

fn default_oauth_providers() -> Vec<String> {
    vec!["github".to_string(), "google".to_string()]
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP gRPC collector; span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AuthSettings {
    /// Where the identity provider sends the browser back to.
    pub fn callback_url(&self, authtype: &str) -> String {
        format!(
            "{}/auth/{}/callback",
            self.site_url.trim_end_matches('/'),
            authtype
        )
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("Cannot determine current directory: {e}")))?;

    // Support running from the workspace root as well as from the crate directory.
    let configuration_directory = if base_path.ends_with("event-portal") {
        base_path.join("config")
    } else {
        base_path.join("event-portal").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("auth.oauth_providers")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
