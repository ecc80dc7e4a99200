//! Metrics module for billing-service.
//! Prometheus exposition of the HTTP middleware counters and reconciliation outcomes.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Times one database operation; records on drop.
pub struct QueryTimer {
    operation: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        histogram!("billing_db_query_duration_seconds", "operation" => self.operation)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Record the outcome of syncing one billing record ("updated" or "failed").
pub fn record_sync_outcome(outcome: &'static str) {
    counter!("billing_sync_records_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a lazy link refresh ("updated", "no_link" or "failed").
pub fn record_lazy_refresh(outcome: &'static str) {
    counter!("billing_lazy_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a newly created billing record by its normalized status.
pub fn record_billing_created(status: &'static str) {
    counter!("billing_created_total", "status" => status).increment(1);
}

/// Record a pending billing handed out again instead of creating a new one.
pub fn record_billing_reused() {
    counter!("billing_reused_total").increment(1);
}

/// Record a failed provider call by operation.
pub fn record_provider_error(operation: &'static str) {
    counter!("billing_provider_errors_total", "operation" => operation).increment(1);
}
