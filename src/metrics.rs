use metrics::{Unit, counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::buildinfo;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn setup_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A metrics recorder is already installed; /metrics will stay empty");
            }

            describe_counter!(
                "mg_webhook_http_requests_total",
                Unit::Count,
                "HTTP requests by endpoint"
            );
            describe_counter!(
                "mg_webhook_requests_total",
                Unit::Count,
                "Webhook deliveries by outcome"
            );
            describe_counter!(
                "mg_webhook_alerts_received_total",
                Unit::Count,
                "Alerts contained in accepted webhook deliveries"
            );
            describe_gauge!(
                "mg_webhook_start_time_seconds",
                Unit::Seconds,
                "Process start time since the Unix epoch"
            );
            describe_gauge!("mg_webhook_version_info", "Build version");

            handle
        })
        .clone()
}

pub fn record_start() {
    let start_timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    gauge!("mg_webhook_start_time_seconds").set(start_timestamp);
    gauge!("mg_webhook_version_info", "version" => buildinfo::version()).set(1.0);
}

pub fn record_request(endpoint: &'static str) {
    counter!("mg_webhook_http_requests_total", "endpoint" => endpoint).increment(1);
}

pub fn record_outcome(outcome: &'static str) {
    counter!("mg_webhook_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_alerts(count: usize) {
    counter!("mg_webhook_alerts_received_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_metrics_is_idempotent() {
        let _ = setup_metrics();
        let handle = setup_metrics();
        record_outcome("ok");
        record_alerts(3);
        record_start();
        let rendered = handle.render();
        assert!(rendered.contains("mg_webhook_requests_total{outcome=\"ok\"}"));
        assert!(rendered.contains("mg_webhook_alerts_received_total"));
        assert!(rendered.contains("mg_webhook_version_info"));
    }
}
