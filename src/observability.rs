use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: method, path, status.
pub const REQUESTS_TOTAL: &str = "quarters_requests_total";

/// Histogram: request latency in seconds. Labels: method, path.
pub const REQUEST_DURATION_SECONDS: &str = "quarters_request_duration_seconds";

/// Counter: allocation requests by outcome (filled, unfilled, contended).
pub const ALLOCATIONS_TOTAL: &str = "quarters_allocations_total";

/// Counter: allocation selection retries after losing a room to a
/// concurrent caller.
pub const ALLOCATION_RETRIES_TOTAL: &str = "quarters_allocation_retries_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms currently in the inventory.
pub const ROOMS_TOTAL: &str = "quarters_rooms_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "quarters_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "quarters_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
