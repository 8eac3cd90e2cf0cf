//! Counters for authentication and authorization activity.
//!
//! Counters go through the `metrics` facade. The bundled Prometheus recorder
//! is only installed by [`init_metrics`]; embedding applications are free to
//! install their own recorder instead.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::counter;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

pub const AUTHENTICATION_TOTAL: &str = "realmguard_authentication_total";
pub const AUTHORIZATION_CHECKS_TOTAL: &str = "realmguard_authorization_checks_total";
pub const AUTHORIZATION_CACHE_TOTAL: &str = "realmguard_authorization_cache_total";

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder as the global `metrics` recorder.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Current counters in Prometheus text format, if the recorder is installed.
pub fn render_metrics() -> Option<String> {
    #[cfg(feature = "prometheus")]
    {
        get_prometheus_handle().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "prometheus"))]
    {
        None
    }
}

/// Record the outcome of one login attempt.
///
/// # Arguments
/// * `outcome` - "success" or "failure"
/// * `kind` - The failure kind, `None` on success
pub fn record_authentication(outcome: &str, kind: Option<&str>) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            AUTHENTICATION_TOTAL,
            "outcome" => outcome.to_string(),
            "kind" => kind.unwrap_or("none").to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (outcome, kind);
    }
}

/// Record one realm's answer to a permission or role check.
pub fn record_authorization_check(realm: &str, allowed: bool) {
    #[cfg(feature = "prometheus")]
    {
        let allowed = if allowed { "true" } else { "false" };
        counter!(
            AUTHORIZATION_CHECKS_TOTAL,
            "realm" => realm.to_string(),
            "allowed" => allowed
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (realm, allowed);
    }
}

/// Record an authorization cache lookup.
pub fn record_authorization_cache(realm: &str, hit: bool) {
    #[cfg(feature = "prometheus")]
    {
        let result = if hit { "hit" } else { "miss" };
        counter!(
            AUTHORIZATION_CACHE_TOTAL,
            "realm" => realm.to_string(),
            "result" => result
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (realm, hit);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
