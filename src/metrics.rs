//! Prometheus metrics for the synchronization engine

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Completed fetches per stream and outcome
    pub static ref FETCHES_TOTAL: CounterVec = register_counter_vec!(
        "livesync_fetches_total",
        "Completed fetch cycles",
        &["stream", "status"]
    ).expect("livesync_fetches_total registers once");

    /// Measurements appended to in-memory series
    pub static ref MEASUREMENTS_MERGED_TOTAL: CounterVec = register_counter_vec!(
        "livesync_measurements_merged_total",
        "Measurements merged into in-memory series",
        &["stream"]
    ).expect("livesync_measurements_merged_total registers once");

    /// Time from dispatch to the scheduler observing completion
    pub static ref FETCH_DURATION: HistogramVec = register_histogram_vec!(
        "livesync_fetch_duration_seconds",
        "Fetch latency as observed by the scheduler",
        &["stream"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).expect("livesync_fetch_duration_seconds registers once");
}

/// Force registration of all metrics
pub fn init() {
    lazy_static::initialize(&FETCHES_TOTAL);
    lazy_static::initialize(&MEASUREMENTS_MERGED_TOTAL);
    lazy_static::initialize(&FETCH_DURATION);
}

/// Record a completed fetch
pub fn record_fetch(stream: &str, status: &str, elapsed_secs: f64) {
    FETCHES_TOTAL.with_label_values(&[stream, status]).inc();
    FETCH_DURATION.with_label_values(&[stream]).observe(elapsed_secs);
}

/// Record measurements merged into a series
pub fn record_merged(stream: &str, count: usize) {
    MEASUREMENTS_MERGED_TOTAL
        .with_label_values(&[stream])
        .inc_by(count as f64);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Metrics are not valid UTF-8: {}", e))
}
