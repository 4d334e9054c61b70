// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    http::Uri,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::embed::embeddings_handler;
use super::handlers::{
    docs_handler, health_handler, load_model_handler, model_info_handler, root_handler,
    unload_model_handler,
};
use super::ApiError;
use crate::config::Settings;
use crate::embeddings::EmbeddingModelManager;
use crate::monitoring::ServiceMetrics;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub manager: Arc<EmbeddingModelManager>,
    pub metrics: Arc<ServiceMetrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        manager: Arc<EmbeddingModelManager>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            settings,
            manager,
            metrics,
            started_at: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let debug = state.settings.debug;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/docs", get(docs_handler))
        .route("/model/info", get(model_info_handler))
        .route("/model/load", post(load_model_handler))
        .route("/model/unload", post(unload_model_handler))
        .route("/embeddings", post(embeddings_handler))
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, debug)
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

/// Global fallback: a panicking handler becomes a 500, with the panic
/// message exposed only in debug mode
fn panic_response(panic: Box<dyn Any + Send + 'static>, debug: bool) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Unhandled exception: {}", message);

    ApiError::Unhandled {
        detail: debug.then_some(message),
    }
    .into_response()
}

async fn bind(host: &str, port: u16, what: &str) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {} listener on {}:{}", what, host, port))?;
    match listener.local_addr() {
        Ok(addr) => tracing::info!("{} server listening on {}", what, addr),
        Err(_) => tracing::info!("{} server listening on {}:{}", what, host, port),
    }
    Ok(listener)
}

/// Serves the API on `host:port` until `shutdown` resolves
pub async fn start_server<F>(state: AppState, host: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    let listener = bind(host, port, "API").await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server failed")?;

    Ok(())
}

/// Serves `GET /metrics` on `host:port` until `shutdown` resolves
pub async fn start_metrics_server<F>(
    metrics: Arc<ServiceMetrics>,
    host: &str,
    port: u16,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(host, port, "Metrics").await?;

    axum::serve(listener, crate::monitoring::metrics_router(metrics))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Metrics server failed")?;

    Ok(())
}
