use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global Prometheus registry for the worker pipeline's counters and gauges.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static BLOCKS_SYNCED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("wallet_blocks_synced_total", "Total blocks appended by the synchronizer").unwrap()
});

pub static REORGS_DETECTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("wallet_reorgs_detected_total", "Total chain reorgs detected").unwrap());

pub static CURSOR_HEIGHT: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("wallet_cursor_height", "Last traversed block height").unwrap());

pub static TRANSACTIONS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("wallet_transactions_processed_total", "Transactions processed by tx_type"),
        &["tx_type"],
    )
    .unwrap()
});

pub static NOTIFY_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("wallet_notify_results_total", "Webhook notification outcomes"),
        &["result"],
    )
    .unwrap()
});

pub static DB_RETRIES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("wallet_db_retries_total", "Total DB transaction retry attempts").unwrap());

pub static RPC_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("wallet_rpc_errors_total", "Chain RPC errors by method"), &["method"]).unwrap()
});

/// Registers all metrics. Call once at startup before any worker ticks.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    REGISTRY.register(Box::new(BLOCKS_SYNCED.clone()))?;
    REGISTRY.register(Box::new(REORGS_DETECTED.clone()))?;
    REGISTRY.register(Box::new(CURSOR_HEIGHT.clone()))?;
    REGISTRY.register(Box::new(TRANSACTIONS_PROCESSED.clone()))?;
    REGISTRY.register(Box::new(NOTIFY_RESULTS.clone()))?;
    REGISTRY.register(Box::new(DB_RETRIES.clone()))?;
    REGISTRY.register(Box::new(RPC_ERRORS.clone()))?;
    Ok(())
}

/// Renders the registry in Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Minimal axum router exposing `/metrics` on its own port alongside the
/// gRPC server.
pub fn metrics_router() -> axum::Router {
    axum::Router::new().route("/metrics", axum::routing::get(|| async { gather_metrics() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_gather_does_not_panic() {
        let _ = init_metrics();
        BLOCKS_SYNCED.inc();
        let output = gather_metrics();
        assert!(output.contains("wallet_blocks_synced_total"));
    }
}
