use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::store::StoreError;

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

    // Session store
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of session store operations",
        &["operation", "backend", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Session store operation duration in seconds",
        &["operation", "backend"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Quiz flow
    pub static ref QUESTIONS_ACTIVATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_activated_total",
        "Total number of question activations",
        &["status"]
    )
    .unwrap();

    pub static ref GRADING_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "grading_runs_total",
        "Total number of grading runs",
        &["status"]
    )
    .unwrap();

    pub static ref SCORES_AWARDED_TOTAL: IntCounter = register_int_counter!(
        "scores_awarded_total",
        "Total number of score entries written by grading"
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers submitted",
        &["within_window"]
    )
    .unwrap();

    pub static ref LIVE_STREAMS_ACTIVE: IntGauge = register_int_gauge!(
        "live_streams_active",
        "Number of open leaderboard and countdown streams"
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

/// Helper: track session store operation with metrics
pub async fn track_store_operation<F, T>(
    operation: &str,
    backend: &str,
    future: F,
) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, backend, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, backend])
        .observe(duration);

    result
}

pub fn status_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

/// Keeps `LIVE_STREAMS_ACTIVE` in step with the lifetime of a stream.
pub struct LiveStreamGuard;

impl LiveStreamGuard {
    pub fn open() -> Self {
        LIVE_STREAMS_ACTIVE.inc();
        LiveStreamGuard
    }
}

impl Drop for LiveStreamGuard {
    fn drop(&mut self) {
        LIVE_STREAMS_ACTIVE.dec();
    }
}
