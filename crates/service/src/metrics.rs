//! Prometheus metrics for the query service.

use std::time::Duration;

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    requests: IntCounter,
    request_errors: IntCounterVec,
    match_latency: Histogram,
    indexed_candidates: IntGauge,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("talentmatch".into()), None)?;

        let requests = IntCounter::new("match_requests_total", "Match requests received")?;
        let request_errors = IntCounterVec::new(
            Opts::new("match_request_errors_total", "Match requests that failed"),
            &["kind"],
        )?;
        let match_latency = Histogram::with_opts(
            HistogramOpts::new("match_latency_seconds", "Embed + search + map latency")
                .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
        )?;
        let indexed_candidates =
            IntGauge::new("indexed_candidates", "Vectors in the loaded index")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_errors.clone()))?;
        registry.register(Box::new(match_latency.clone()))?;
        registry.register(Box::new(indexed_candidates.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_errors,
            match_latency,
            indexed_candidates,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_error(&self, kind: &str) {
        self.request_errors.with_label_values(&[kind]).inc();
    }

    pub fn observe_latency(&self, elapsed: Duration) {
        self.match_latency.observe(elapsed.as_secs_f64());
    }

    pub fn set_indexed(&self, count: usize) {
        self.indexed_candidates
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn scrape(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
