// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/metrics.rs - Prometheus metrics collection and export

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Service metrics backed by a private Prometheus registry
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    requests: IntCounterVec,
    texts: IntCounter,
    batches: IntCounter,
    processing_seconds: Histogram,
    model_loads: IntCounterVec,
    model_loaded: IntGauge,
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics").finish_non_exhaustive()
    }
}

impl ServiceMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "embeddings_requests_total",
                "Embedding requests by outcome",
            ),
            &["outcome"],
        )?;
        let texts = IntCounter::new("embeddings_texts_total", "Texts embedded")?;
        let batches = IntCounter::new("embeddings_batches_total", "Inference batches executed")?;
        let processing_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "embeddings_processing_seconds",
                "Time spent loading and running inference per request",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        let model_loads = IntCounterVec::new(
            Opts::new("model_loads_total", "Model load attempts by outcome"),
            &["outcome"],
        )?;
        let model_loaded = IntGauge::new("model_loaded", "1 when a model is resident")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(texts.clone()))?;
        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(processing_seconds.clone()))?;
        registry.register(Box::new(model_loads.clone()))?;
        registry.register(Box::new(model_loaded.clone()))?;

        Ok(Self {
            registry,
            requests,
            texts,
            batches,
            processing_seconds,
            model_loads,
            model_loaded,
        })
    }

    pub fn record_request(&self, success: bool, processing_time: Option<Duration>) {
        self.requests
            .with_label_values(&[outcome(success)])
            .inc();
        if let Some(elapsed) = processing_time {
            self.processing_seconds.observe(elapsed.as_secs_f64());
        }
    }

    pub fn record_batches(&self, texts: usize, batches: usize) {
        self.texts.inc_by(texts as u64);
        self.batches.inc_by(batches as u64);
    }

    pub fn record_model_load(&self, success: bool) {
        self.model_loads.with_label_values(&[outcome(success)]).inc();
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(i64::from(loaded));
    }

    /// Renders every metric in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Router serving `GET /metrics`
pub fn metrics_router(metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<ServiceMetrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
