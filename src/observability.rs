use std::net::SocketAddr;

use ulid::Ulid;

use crate::manager::ReservationError;
use crate::store::StoreError;

// ── Request metrics ─────────────────────────────────────────────

/// Counter: create attempts. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "roombook_reservations_total";

/// Histogram: create latency in seconds, store round-trips included.
pub const CREATE_DURATION_SECONDS: &str = "roombook_create_duration_seconds";

// ── Store metrics ───────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a create result to a short label for metrics.
pub fn create_outcome(result: &Result<Ulid, ReservationError>) -> &'static str {
    match result {
        Ok(_) => "created",
        Err(ReservationError::Validation(_)) => "invalid",
        Err(ReservationError::Conflict { .. }) => "conflict",
        Err(ReservationError::Store(StoreError::Timeout)) => "timeout",
        Err(ReservationError::Store(_)) => "store_error",
    }
}
