use dotenvy::dotenv;
use event_portal::config::get_configuration;
use event_portal::services::BackendClient;
use event_portal::startup::{build_router, SessionOptions};
use event_portal::AppState;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "event-portal",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    event_portal::services::metrics::init_metrics()?;

    let backend = BackendClient::new(configuration.backend.clone())?;
    info!(backend_url = %backend.base_url(), "Backend client ready");

    let state = AppState::new(Arc::new(backend), configuration.auth.clone());
    let app = build_router(state, SessionOptions::from(&configuration.server));

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting event-portal on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
