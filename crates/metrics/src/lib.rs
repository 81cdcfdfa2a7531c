//! Metrics and tracing setup for the tablet directory.
//!
//! Provides a global [`DirectoryMetrics`] singleton backed by the `prometheus`
//! crate, and the `tracing` subscriber used by the coordinator binary.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<DirectoryMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static DirectoryMetrics {
    METRICS.get_or_init(DirectoryMetrics::new)
}

/// All Prometheus metrics for the tablet directory.
pub struct DirectoryMetrics {
    pub registry: Registry,

    // ── Membership of the directory ──
    pub tablets_added: IntCounter,
    pub tablets_removed: IntCounter,

    // ── Mutations ──
    pub splits: IntCounter,
    pub split_rejections: IntCounter,
    pub status_updates: IntCounter,

    // ── Lookups ──
    pub lookup_misses: IntCounter,

    // ── Latency ──
    pub op_latency_secs: HistogramVec,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for DirectoryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryMetrics").finish_non_exhaustive()
    }
}

/// Directory operations are in-memory; buckets start in the microseconds.
const LATENCY_BUCKETS: &[f64] = &[0.000_001, 0.000_01, 0.000_1, 0.001, 0.01, 0.1];

impl DirectoryMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let tablets_added = IntCounter::with_opts(Opts::new(
            "tablets_added_total",
            "Tablets inserted, including split siblings",
        ))
        .expect("tablets_added counter");
        let tablets_removed = IntCounter::with_opts(Opts::new(
            "tablets_removed_total",
            "Tablets removed by table-wide removal",
        ))
        .expect("tablets_removed counter");

        let splits = IntCounter::with_opts(Opts::new("tablet_splits_total", "Tablet splits"))
            .expect("splits counter");
        let split_rejections = IntCounter::with_opts(Opts::new(
            "tablet_split_rejections_total",
            "Splits rejected for a bad split point",
        ))
        .expect("split_rejections counter");
        let status_updates = IntCounter::with_opts(Opts::new(
            "tablet_status_updates_total",
            "Tablets whose status was changed by a per-server update",
        ))
        .expect("status_updates counter");

        let lookup_misses = IntCounter::with_opts(Opts::new(
            "tablet_lookup_misses_total",
            "Exact-match lookups that found no tablet",
        ))
        .expect("lookup_misses counter");

        let op_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "tablet_op_latency_seconds",
                "Directory operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op"],
        )
        .expect("op_latency_secs histogram");

        registry
            .register(Box::new(tablets_added.clone()))
            .expect("register tablets_added");
        registry
            .register(Box::new(tablets_removed.clone()))
            .expect("register tablets_removed");
        registry
            .register(Box::new(splits.clone()))
            .expect("register splits");
        registry
            .register(Box::new(split_rejections.clone()))
            .expect("register split_rejections");
        registry
            .register(Box::new(status_updates.clone()))
            .expect("register status_updates");
        registry
            .register(Box::new(lookup_misses.clone()))
            .expect("register lookup_misses");
        registry
            .register(Box::new(op_latency_secs.clone()))
            .expect("register op_latency_secs");

        Self {
            registry,
            tablets_added,
            tablets_removed,
            splits,
            split_rejections,
            status_updates,
            lookup_misses,
            op_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: start a directory operation latency timer. Returns a guard that
/// records elapsed time on drop.
pub fn start_op_timer(op: &str) -> prometheus::HistogramTimer {
    metrics()
        .op_latency_secs
        .with_label_values(&[op])
        .start_timer()
}

// ────────────────────────── Tests ──────────────────────────
