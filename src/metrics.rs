// Prometheus metrics definitions for the rift backend.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Game actions handled, by action and outcome (ok or rejection kind).
    pub static ref ACTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rift_actions_total", "Game actions handled"),
        &["action", "outcome"],
    )
    .unwrap();

    /// Oracle drafts, by draft kind and result (ok or fallback).
    pub static ref ORACLE_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rift_oracle_calls_total", "Oracle drafts by result"),
        &["kind", "result"],
    )
    .unwrap();

    /// Essence credited to players, by source.
    pub static ref ESSENCE_MINTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rift_essence_minted_total", "Essence credited to players"),
        &["source"],
    )
    .unwrap();

    /// Monsters created, by origin (spawn or merge).
    pub static ref MONSTERS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rift_monsters_created_total", "Monsters created"),
        &["origin"],
    )
    .unwrap();

    /// World bosses defeated.
    pub static ref BOSS_KILLS_TOTAL: IntCounter =
        IntCounter::new("rift_boss_kills_total", "World bosses defeated").unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Oracle round-trip time in seconds (including timeouts).
    pub static ref ORACLE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("rift_oracle_latency_seconds", "Oracle round-trip time")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]),
    )
    .unwrap();

    /// API request duration in seconds, by action.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "rift_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 20.0]),
        &["action"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ACTIONS_TOTAL.clone()),
            Box::new(ORACLE_CALLS_TOTAL.clone()),
            Box::new(ESSENCE_MINTED_TOTAL.clone()),
            Box::new(MONSTERS_CREATED_TOTAL.clone()),
            Box::new(BOSS_KILLS_TOTAL.clone()),
            Box::new(ORACLE_LATENCY_SECONDS.clone()),
            Box::new(API_REQUEST_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            REGISTRY.register(c).expect("failed to register metric");
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
