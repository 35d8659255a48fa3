use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static AUTH_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static EVENT_REGISTRATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the HTTP metrics recorder and register the portal's own counters.
///
/// Call once at startup; the recording helpers are no-ops until then.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics already initialized");
    }

    let registry = Registry::new();

    let auth_attempts = IntCounterVec::new(
        Opts::new(
            "auth_attempts_total",
            "Login, registration and OAuth attempts by outcome",
        ),
        &["action", "outcome"],
    )?;

    let registrations = IntCounterVec::new(
        Opts::new(
            "event_registrations_total",
            "Event registration attempts by outcome",
        ),
        &["outcome"],
    )?;

    registry.register(Box::new(auth_attempts.clone()))?;
    registry.register(Box::new(registrations.clone()))?;

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = AUTH_ATTEMPTS_TOTAL.set(auth_attempts);
    let _ = EVENT_REGISTRATIONS_TOTAL.set(registrations);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&registry.gather(), &mut buffer).is_ok() {
            if let Ok(custom_metrics) = String::from_utf8(buffer) {
                output.push_str(&custom_metrics);
            }
        }
    }

    output
}

pub fn record_auth_attempt(action: &str, outcome: &str) {
    if let Some(counter) = AUTH_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[action, outcome]).inc();
    }
}

pub fn record_registration(outcome: &str) {
    if let Some(counter) = EVENT_REGISTRATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}
