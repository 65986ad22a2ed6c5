use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: committed state transitions. Labels: action.
pub const TRANSITIONS_TOTAL: &str = "innkeep_transitions_total";

/// Counter: soft holds placed.
pub const HOLDS_CREATED_TOTAL: &str = "innkeep_holds_created_total";

/// Counter: holds expired by the reaper.
pub const HOLDS_EXPIRED_TOTAL: &str = "innkeep_holds_expired_total";

/// Counter: hold attempts that lost a room to a conflict and retried the
/// next candidate.
pub const HOLD_RETRIES_TOTAL: &str = "innkeep_hold_retries_total";

/// Counter: hold requests that exhausted every candidate room.
pub const NO_AVAILABILITY_TOTAL: &str = "innkeep_no_availability_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install the fmt tracing subscriber. Call once from the embedding
/// process before constructing an engine.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is `None`.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
