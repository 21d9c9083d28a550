//! Prometheus metrics.

use axum::{body::Body, http::Request, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use tracing::Span;

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Simple request counter
    pub static ref INCOMING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("incoming_requests", "The number of HTTP requests received"),
        &["http_method"]
    ).unwrap();
    // Request counter by status code
    pub static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_response", "The number of responses sent."),
        &["status_code"]
    ).unwrap();
    // Request histogram by response time
    pub static ref RESPONSE_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("response_time", "The time taken to respond to each request"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).unwrap();
    // Partition read attempts by outcome: ok, retry, timeout or error
    pub static ref PARTITION_READS: IntCounterVec = IntCounterVec::new(
        Opts::new("partition_reads", "The number of series partition reads"),
        &["outcome"]
    ).unwrap();
    // Project timezones replaced by UTC
    pub static ref TIMEZONE_FALLBACKS: IntCounter = IntCounter::new(
        "timezone_fallbacks",
        "The number of queries served in UTC because the project timezone could not be resolved"
    ).unwrap();
    // Points returned per query, by time model
    pub static ref EMITTED_POINTS: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("emitted_points", "The number of points returned by each query"),
            buckets: prometheus::exponential_buckets(1.0, 4.0, 10).unwrap(),
        },
        &["time_model"],
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY
        .register(Box::new(INCOMING_REQUESTS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RESPONSE_CODE_COLLECTOR.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RESPONSE_TIME_COLLECTOR.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(PARTITION_READS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(TIMEZONE_FALLBACKS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EMITTED_POINTS.clone()))
        .unwrap();
}

/// Renders the registered metrics in the prometheus text format.
pub async fn metrics_handler() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("failed to encode metrics: {}", err);
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

/// Increments the prometheus counter on all incoming requests, labelled by http method
pub fn request_counter(request: &Request<Body>, _span: &Span) {
    INCOMING_REQUESTS
        .with_label_values(&[&request.method().to_string().to_ascii_uppercase()])
        .inc();
}

/// Increment the prometheus counter on all outgoing responses, labelled by status code
pub fn record_response_metrics<B>(
    response: &Response<B>,
    latency: std::time::Duration,
    _span: &Span,
) {
    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[response.status().as_str()])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[])
        .observe(latency.as_secs_f64());
}
