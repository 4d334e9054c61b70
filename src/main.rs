// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use embeddings_generator::{
    api::{start_metrics_server, start_server, AppState},
    config::Settings,
    embeddings::{EmbeddingModelConfig, EmbeddingModelManager, HubModelLoader},
    logging,
    monitoring::ServiceMetrics,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

fn main() -> Result<()> {
    let settings = Settings::load()?;
    logging::init(&settings.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.workers)
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    println!("🚀 Starting {} v{}", settings.app_name, settings.app_version);
    info!("Settings: {:?}", settings);

    let metrics = Arc::new(ServiceMetrics::new().context("Failed to register metrics")?);
    let loader = Arc::new(HubModelLoader::new(settings.model_cache_dir.clone()));
    let manager = Arc::new(EmbeddingModelManager::new(
        EmbeddingModelConfig::from(&settings),
        loader,
        Arc::clone(&metrics),
    )?);
    info!(
        "Model {} will be loaded on first request",
        settings.default_model_name
    );

    let settings = Arc::new(settings);
    let state = AppState::new(Arc::clone(&settings), Arc::clone(&manager), Arc::clone(&metrics));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_handle = if settings.enable_metrics {
        let rx = shutdown_rx.clone();
        let metrics = Arc::clone(&metrics);
        let (host, port) = settings.metrics_endpoint();
        let host = host.to_string();
        Some(tokio::spawn(async move {
            if let Err(e) = start_metrics_server(metrics, &host, port, wait_for(rx)).await {
                error!("Metrics server error: {:#}", e);
            }
        }))
    } else {
        info!("Metrics disabled");
        None
    };

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let (host, port) = settings.api_endpoint();
    println!("✅ Listening on http://{}:{}", host, port);
    start_server(state, host, port, wait_for(shutdown_rx)).await?;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    manager.unload().await?;
    println!("👋 Shut down cleanly");
    Ok(())
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
