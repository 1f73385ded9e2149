use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all recordings bridge metrics
const PREFIX: &str = "recordings_bridge";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 1.0, 10.0, 60.0, 300.0, 900.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Pipeline Metrics
    pub static ref PIPELINE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_runs_total"), "Pipeline runs by outcome"),
        &["outcome"]
    ).expect("Failed to create pipeline_runs_total metric");

    pub static ref PIPELINE_RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_pipeline_run_duration_seconds"),
            "Pipeline run duration in seconds"
        )
        .buckets(vec![1.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0])
    ).expect("Failed to create pipeline_run_duration_seconds metric");

    pub static ref REGION_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_region_failures_total"), "Failed regions by error kind"),
        &["kind"]
    ).expect("Failed to create region_failures_total metric");

    pub static ref FILES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_files_total"), "Processed recordings by outcome"),
        &["outcome"]
    ).expect("Failed to create files_total metric");

    pub static ref EXPORT_STATUS_CHECKS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_export_status_checks"),
            "Status checks made per bulk export job"
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 50.0])
    ).expect("Failed to create export_status_checks metric");
}

/// Initialize and register all metrics with the registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(REGION_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FILES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EXPORT_STATUS_CHECKS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a finished pipeline run
pub fn record_pipeline_run(outcome: &str, duration: Duration) {
    PIPELINE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    PIPELINE_RUN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_region_failure(kind: &str) {
    REGION_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_file_outcome(outcome: &str) {
    FILES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_export_status_checks(checks: u32) {
    EXPORT_STATUS_CHECKS.observe(checks as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
