use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    // Business Metrics
    pub static ref PATHS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "paths_generated_total",
        "Total number of learning path generation attempts",
        &["status"]
    )
    .unwrap();

    pub static ref PATH_GENERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "path_generation_duration_seconds",
        "End-to-end learning path generation duration in seconds",
        &["status"],
        vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0]
    )
    .unwrap();

    pub static ref LESSONS_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        "lessons_completed_total",
        "Total number of lessons marked complete"
    )
    .unwrap();

    pub static ref QUIZZES_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quizzes_submitted_total",
        "Total number of quiz scores submitted",
        &["result"]
    )
    .unwrap();

    pub static ref CHAT_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chat_messages_total",
        "Total number of tutor chat messages processed",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}
