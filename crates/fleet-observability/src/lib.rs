//! Process-wide tracing and Prometheus setup for fleet services. Metric names
//! and help text live with the crates that emit them.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{AddrParseError, SocketAddr};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
    /// Prometheus scrape listener; no exporter when unset.
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsStatus {
    Disabled,
    Listening(SocketAddr),
    Failed,
}

#[derive(Debug, Clone)]
pub struct ObservabilityHandle {
    pub service_name: String,
    pub metrics: MetricsStatus,
}

impl ObservabilityHandle {
    pub fn metrics_enabled(&self) -> bool {
        matches!(self.metrics, MetricsStatus::Listening(_))
    }
}

pub fn init(config: &ObservabilityConfig) -> ObservabilityHandle {
    install_tracing(config);
    ObservabilityHandle {
        service_name: config.service_name.clone(),
        metrics: install_metrics(config),
    }
}

pub fn log_startup(handle: &ObservabilityHandle, environment: &str) {
    tracing::info!(
        service = %handle.service_name,
        environment = %environment,
        metrics = ?handle.metrics,
        "fleet service starting"
    );
}

pub fn metrics_listen_addr(
    config: &ObservabilityConfig,
) -> Result<Option<SocketAddr>, AddrParseError> {
    config.metrics_addr.as_deref().map(str::parse).transpose()
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn install_tracing(config: &ObservabilityConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.log_level))
        .with_target(true)
        .finish();

    // A subscriber already installed (tests, embedding) keeps receiving events.
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        tracing::warn!(
            service = %config.service_name,
            error = %err,
            "tracing subscriber already installed"
        );
    }
}

fn install_metrics(config: &ObservabilityConfig) -> MetricsStatus {
    let addr = match metrics_listen_addr(config) {
        Ok(Some(addr)) => addr,
        Ok(None) => return MetricsStatus::Disabled,
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "invalid FLEET_METRICS_ADDR, metrics disabled"
            );
            return MetricsStatus::Failed;
        }
    };

    let installed = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .add_global_label("environment", config.environment.clone())
        .install();
    match installed {
        Ok(()) => MetricsStatus::Listening(addr),
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                %addr,
                error = %err,
                "prometheus exporter failed to start"
            );
            MetricsStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(metrics_addr: Option<&str>) -> ObservabilityConfig {
        ObservabilityConfig {
            service_name: "fleet-api".to_string(),
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            metrics_addr: metrics_addr.map(str::to_string),
        }
    }

    #[test]
    fn metrics_addr_is_optional() {
        assert_eq!(metrics_listen_addr(&config(None)), Ok(None));
        let addr = metrics_listen_addr(&config(Some("127.0.0.1:9464"))).expect("valid addr");
        assert_eq!(addr.map(|addr| addr.port()), Some(9464));
        assert!(metrics_listen_addr(&config(Some("localhost"))).is_err());
    }

    #[test]
    fn exporter_is_not_started_without_a_valid_addr() {
        assert_eq!(install_metrics(&config(None)), MetricsStatus::Disabled);
        assert_eq!(
            install_metrics(&config(Some("not an addr"))),
            MetricsStatus::Failed
        );
    }

    #[test]
    fn repeated_init_keeps_running() {
        let handle = init(&config(None));
        let again = init(&config(None));
        assert!(!handle.metrics_enabled());
        assert_eq!(again.metrics, MetricsStatus::Disabled);
    }
}
