//! Prometheus metrics infrastructure
//!
//! Exposes metrics at `/metrics` on the configured port. The engine
//! crates emit their series directly through the `metrics` macros:
//!
//! * `contracts_created_total{asset_class, region}` - contracts created
//! * `margin_calls_issued_total{region}` - margin calls issued
//! * `margin_auto_liquidations_total` - auto-liquidations fired
//! * `settlements_started_total` - settlement workflows started
//! * `settlements_completed_total` - settlement workflows completed
//! * `settlements_failed_total` - settlement workflows failed
//! * `reconciliation_runs_total` - reconciliation runs performed
//! * `reconciliation_breaks_total` - breaks found across runs

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus exporter on the given port
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_engine_metrics();

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Attach help text to the series the engine crates emit
pub fn describe_engine_metrics() {
    describe_counter!("contracts_created_total", "Contracts created");
    describe_counter!("margin_calls_issued_total", "Margin calls issued");
    describe_counter!(
        "margin_auto_liquidations_total",
        "Auto-liquidations fired for unmet margin calls"
    );
    describe_counter!("settlements_started_total", "Settlement workflows started");
    describe_counter!(
        "settlements_completed_total",
        "Settlement workflows completed"
    );
    describe_counter!("settlements_failed_total", "Settlement workflows failed");
    describe_counter!("reconciliation_runs_total", "Reconciliation runs performed");
    describe_counter!(
        "reconciliation_breaks_total",
        "Reconciliation breaks found across runs"
    );
}
