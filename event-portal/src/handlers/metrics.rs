use axum::{http::header, response::IntoResponse};

/// Prometheus text exposition: HTTP metrics followed by portal counters.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::services::metrics::get_metrics(),
    )
}
