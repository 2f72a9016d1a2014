//! Prometheus metrics for request outcomes and inference latency.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Service metrics, registered in a private registry.
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    inference_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("voice_sql_requests_total", "Requests by outcome"),
            &["outcome"],
        )?;
        let inference_seconds = HistogramVec::new(
            HistogramOpts::new(
                "voice_sql_inference_seconds",
                "Time spent waiting on the inference backend",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["backend"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(inference_seconds.clone()))?;

        Ok(Self {
            registry,
            requests,
            inference_seconds,
        })
    }

    pub fn record_request(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    pub fn observe_inference(&self, backend: &str, seconds: f64) {
        self.inference_seconds
            .with_label_values(&[backend])
            .observe(seconds);
    }

    pub fn request_count(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("success");
        metrics.record_request("success");
        metrics.record_request("invalid_payload");
        assert_eq!(metrics.request_count("success"), 2);
        assert_eq!(metrics.request_count("invalid_payload"), 1);
        assert_eq!(metrics.request_count("loading"), 0);
    }

    #[test]
    fn test_render_contains_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("success");
        metrics.observe_inference("remote", 0.3);
        let text = metrics.render().unwrap();
        assert!(text.contains("voice_sql_requests_total{outcome=\"success\"} 1"));
        assert!(text.contains("voice_sql_inference_seconds_count{backend=\"remote\"} 1"));
    }
}
