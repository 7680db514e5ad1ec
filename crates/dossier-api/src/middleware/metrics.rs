//! # Prometheus Metrics
//!
//! Request metrics are recorded by [`metrics_middleware`]. The dossier
//! gauges are not updated on every state change: [`ApiMetrics::refresh`]
//! reads them from the engine when `/metrics` is scraped.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use dossier_engine::DossierEngine;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Request latency buckets, in seconds. Uploads sit in the upper range.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.02, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0];

/// Handle to the service's Prometheus registry. Clones share counters.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Collectors>,
}

struct Collectors {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    failures: IntCounterVec,
    cases_by_status: GaugeVec,
    documents_committed: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("failures", &self.failures())
            .finish()
    }
}

impl ApiMetrics {
    /// Build the collectors and register them in a fresh registry.
    pub fn try_new() -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("dossier_http_requests_total", "HTTP requests by route and status"),
            &["method", "path", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("dossier_http_request_duration_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new("dossier_http_errors_total", "HTTP responses with a 4xx or 5xx status"),
            &["method", "path", "status"],
        )?;
        let cases_by_status = GaugeVec::new(
            Opts::new("dossier_cases_total", "Dossiers by status"),
            &["status"],
        )?;
        let documents_committed = Gauge::new(
            "dossier_documents_total",
            "Documents currently committed to a slot",
        )?;

        let registry = Registry::new();
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(cases_by_status.clone()))?;
        registry.register(Box::new(documents_committed.clone()))?;

        Ok(Self {
            inner: Arc::new(Collectors {
                registry,
                requests,
                latency,
                failures,
                cases_by_status,
                documents_committed,
            }),
        })
    }

    /// Requests seen so far, all routes.
    pub fn requests(&self) -> u64 {
        counter_total(&self.inner.requests)
    }

    /// 4xx and 5xx responses seen so far, all routes.
    pub fn failures(&self) -> u64 {
        counter_total(&self.inner.failures)
    }

    fn observe(&self, method: &str, path: &str, status: u16, elapsed_secs: f64) {
        let failed = status >= 400;
        let status = status.to_string();
        let labels = [method, path, status.as_str()];
        self.inner.requests.with_label_values(&labels).inc();
        self.inner
            .latency
            .with_label_values(&[method, path])
            .observe(elapsed_secs);
        if failed {
            self.inner.failures.with_label_values(&labels).inc();
        }
    }

    /// Copy the current dossier counts from the engine into the gauges.
    /// Statuses with no dossier left are dropped from the output.
    pub fn refresh(&self, engine: &DossierEngine) {
        let gauge = &self.inner.cases_by_status;
        gauge.reset();
        for (status, count) in engine.store().status_counts() {
            gauge.with_label_values(&[status.as_str()]).set(count as f64);
        }
        self.inner
            .documents_committed
            .set(engine.registry().len() as f64);
    }

    /// Prometheus text exposition of every registered collector.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output is not UTF-8")
    }
}

fn counter_total(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}

/// Route label for a request path: case, product and document ids become
/// `{id}` so each route yields one series.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record method, route, status and latency of every request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let Some(metrics) = request.extensions().get::<ApiMetrics>().cloned() else {
        return next.run(request).await;
    };
    let method = request.method().as_str().to_owned();
    let route = route_label(request.uri().path());
    let started = Instant::now();

    let response = next.run(request).await;
    metrics.observe(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
