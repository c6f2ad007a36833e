use axum::{routing::get, Router};
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe our series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!(
            "llm_provider_calls_total",
            Unit::Count,
            "Provider calls by provider, action and outcome (ok/error/malformed)."
        );
        describe_counter!(
            "llm_fallback_total",
            Unit::Count,
            "Calls that fell through to the fallback provider."
        );
        describe_counter!(
            "compliance_safe_default_total",
            Unit::Count,
            "Compliance checks answered with the fail-safe verdict."
        );
        describe_counter!(
            "topics_refresh_total",
            Unit::Count,
            "Server-side topic refreshes by resulting source."
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
