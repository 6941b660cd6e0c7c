//! Prometheus metrics setup and metric definitions

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    Ok(handle)
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup.
pub fn describe_metrics() {
    // HTTP metrics
    describe_counter!(
        "tenantry_http_requests_total",
        "HTTP requests by route, status and tenant context kind"
    );
    describe_histogram!(
        "tenantry_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "tenantry_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Tenancy / authorization
    describe_counter!(
        "tenantry_context_resolutions_total",
        "Tenant context resolutions by outcome"
    );
    describe_counter!(
        "tenantry_authorization_decisions_total",
        "Capability checks by deciding rule and outcome"
    );

    // Ledger
    describe_counter!(
        "tenantry_sms_ledger_operations_total",
        "SMS ledger mutations by kind and result"
    );
    describe_counter!(
        "tenantry_sms_ledger_retries_total",
        "Ledger mutations retried after a concurrency conflict"
    );
    describe_counter!(
        "tenantry_sms_ledger_integrity_holds_total",
        "Integrity holds placed after a failed ledger replay"
    );

    // Provisioning
    describe_counter!(
        "tenantry_tenants_provisioned_total",
        "Tenants created, labelled by whether a subscription was provisioned"
    );

    counter!("tenantry_context_resolutions_total", "outcome" => "anonymous").absolute(0);
    counter!("tenantry_authorization_decisions_total", "rule" => "superuser", "allowed" => "true")
        .absolute(0);
    counter!("tenantry_sms_ledger_operations_total", "kind" => "usage", "result" => "ok")
        .absolute(0);
    counter!("tenantry_sms_ledger_retries_total").absolute(0);
    counter!("tenantry_sms_ledger_integrity_holds_total").absolute(0);
    counter!("tenantry_tenants_provisioned_total", "subscription" => "trial").absolute(0);
    histogram!("tenantry_http_request_duration_seconds", "method" => "GET", "route" => "/health")
        .record(0.0);
    gauge!("tenantry_http_requests_in_flight").set(0.0);
}
