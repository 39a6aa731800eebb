use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its built-in scrape endpoint
/// and register all application metrics.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus exporter: {e}"))?;

    // Pre-register counters so they appear even before the first increment.
    counter!("position_changes_total").absolute(0);
    counter!("orders_placed").absolute(0);
    counter!("orders_filled").absolute(0);
    counter!("orders_failed").absolute(0);
    counter!("orders_cancelled").absolute(0);
    counter!("orders_requoted").absolute(0);
    counter!("orders_partial_fills").absolute(0);
    counter!("orders_market_converted").absolute(0);
    counter!("accumulation_deferrals").absolute(0);
    counter!("copies_skipped_balance").absolute(0);

    // Pre-register gauges at zero.
    gauge!("open_copy_orders").set(0.0);

    tracing::info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}
