// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Model Manager
//!
//! Owns the single resident embedding model. Models are loaded on first use,
//! swapped when a request names a different model and unloaded on demand.
//!
//! # Locking
//! - `load` / `unload` are serialised by a `tokio::sync::Mutex`. Fetching and
//!   initialising a model happens under that mutex only.
//! - The resident slot sits behind a `tokio::sync::RwLock`. The write lock is
//!   taken just to swap or clear the slot.
//! - `embed` holds a read guard until its inference finishes, so a swap or
//!   unload waits for in-flight requests and no request ever sees a
//!   half-initialised model.
//! - Residency is mirrored in an `AtomicBool`, so `is_loaded` never waits on
//!   either lock.
//!
//! A failed load leaves the previously resident model in place.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{error, info, warn};

use super::batch::{effective_batch_size, run_batches};
use super::{EmbeddingError, EmbeddingModel, ModelLoader};
use crate::config::Settings;
use crate::monitoring::ServiceMetrics;

/// Sample text used to discover dimensions of models that don't report them
const DIMENSION_SAMPLE: &str = "test";

/// Manager configuration
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    /// Model used when a call does not name one
    pub default_model_name: String,
    /// Directory for fetched model artifacts
    pub model_cache_dir: PathBuf,
    /// Texts per inference call when the caller does not choose
    pub max_batch_size: usize,
    /// Fallback when a model does not report its max sequence length
    pub max_sequence_length: usize,
}

impl From<&Settings> for EmbeddingModelConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            default_model_name: settings.default_model_name.clone(),
            model_cache_dir: settings.model_cache_dir.clone(),
            max_batch_size: settings.max_batch_size,
            max_sequence_length: settings.max_sequence_length,
        }
    }
}

/// Snapshot of the resident model, as reported by `/model/info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: Option<String>,
    pub model_type: Option<String>,
    pub max_sequence_length: Option<usize>,
    pub embedding_dimensions: Option<usize>,
    pub is_loaded: bool,
}

impl ModelInfo {
    fn not_loaded() -> Self {
        Self {
            model_name: None,
            model_type: None,
            max_sequence_length: None,
            embedding_dimensions: None,
            is_loaded: false,
        }
    }
}

/// Result of one `embed` call
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One vector per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// Model that produced the vectors
    pub model_name: String,
    pub dimensions: usize,
    /// Wall-clock time for load check plus inference
    pub processing_time: Duration,
}

/// The resident model and the properties resolved when it was loaded
struct LoadedModel {
    name: String,
    model: Arc<dyn EmbeddingModel>,
    dimensions: Option<usize>,
    max_sequence_length: usize,
    loaded_at: DateTime<Utc>,
    load_time: Duration,
}

/// Manager for the single resident embedding model
pub struct EmbeddingModelManager {
    config: EmbeddingModelConfig,
    loader: Arc<dyn ModelLoader>,
    metrics: Arc<ServiceMetrics>,
    resident: RwLock<Option<LoadedModel>>,
    load_lock: Mutex<()>,
    loaded: AtomicBool,
}

impl std::fmt::Debug for EmbeddingModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModelManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EmbeddingModelManager {
    /// Creates a manager with nothing resident.
    ///
    /// Creates `model_cache_dir` if it does not exist yet.
    pub fn new(
        config: EmbeddingModelConfig,
        loader: Arc<dyn ModelLoader>,
        metrics: Arc<ServiceMetrics>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.model_cache_dir).map_err(|e| {
            anyhow!(
                "Failed to create model cache directory {}: {}",
                config.model_cache_dir.display(),
                e
            )
        })?;

        Ok(Self {
            config,
            loader,
            metrics,
            resident: RwLock::new(None),
            load_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EmbeddingModelConfig {
        &self.config
    }

    fn resolve_name<'a>(&'a self, model_name: Option<&'a str>) -> &'a str {
        match model_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.config.default_model_name,
        }
    }

    /// Loads `model_name` (or the default) unless it is already resident.
    pub async fn load(&self, model_name: Option<&str>) -> Result<(), EmbeddingError> {
        let name = self.resolve_name(model_name);

        if self.is_current(name).await {
            info!("Model {} is already loaded", name);
            return Ok(());
        }

        let _serial = self.load_lock.lock().await;
        // Another caller may have loaded it while we waited
        if self.is_current(name).await {
            info!("Model {} is already loaded", name);
            return Ok(());
        }

        let loaded = match self.build(name).await {
            Ok(loaded) => loaded,
            Err(e) => {
                if let Some(current) = self.current_model_name().await {
                    warn!("Keeping previously loaded model {}", current);
                }
                return Err(e);
            }
        };
        let load_time = loaded.load_time;

        let previous = {
            let mut slot = self.resident.write().await;
            let previous = slot.replace(loaded);
            self.loaded.store(true, Ordering::Release);
            previous
        };
        if let Some(previous) = previous {
            info!("Replaced model {} with {}", previous.name, name);
        }

        self.metrics.record_model_load(true);
        self.metrics.set_model_loaded(true);
        info!(
            "Model {} loaded successfully in {:.2} seconds",
            name,
            load_time.as_secs_f64()
        );
        Ok(())
    }

    /// Fetches and initialises `name` without touching the resident slot
    async fn build(&self, name: &str) -> Result<LoadedModel, EmbeddingError> {
        info!("Loading model: {}", name);
        let start = Instant::now();

        let model = self.loader.load(name).await.map_err(|source| {
            error!("Failed to load model {}: {:#}", name, source);
            self.metrics.record_model_load(false);
            EmbeddingError::Load {
                model: name.to_string(),
                source,
            }
        })?;

        let dimensions = resolve_dimensions(&model).await;
        let max_sequence_length = model
            .max_sequence_length()
            .unwrap_or(self.config.max_sequence_length);

        Ok(LoadedModel {
            name: name.to_string(),
            model,
            dimensions,
            max_sequence_length,
            loaded_at: Utc::now(),
            load_time: start.elapsed(),
        })
    }

    /// Drops the resident model. A no-op when nothing is loaded.
    pub async fn unload(&self) -> Result<(), EmbeddingError> {
        let _serial = self.load_lock.lock().await;
        let previous = {
            let mut slot = self.resident.write().await;
            self.loaded.store(false, Ordering::Release);
            slot.take()
        };
        if let Some(loaded) = previous {
            info!(
                "Unloading model: {} (loaded at {})",
                loaded.name,
                loaded.loaded_at.to_rfc3339()
            );
            drop(loaded);
            self.metrics.set_model_loaded(false);
        }
        Ok(())
    }

    /// Whether a model is resident. Never waits on a load or swap in progress.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn is_current(&self, name: &str) -> bool {
        is_resident(&*self.resident.read().await, name)
    }

    pub async fn current_model_name(&self) -> Option<String> {
        self.resident
            .read()
            .await
            .as_ref()
            .map(|loaded| loaded.name.clone())
    }

    /// When the resident model was loaded and how long loading took
    pub async fn load_stats(&self) -> Option<(DateTime<Utc>, Duration)> {
        self.resident
            .read()
            .await
            .as_ref()
            .map(|loaded| (loaded.loaded_at, loaded.load_time))
    }

    /// Describes the resident model.
    ///
    /// Reports not-loaded when nothing is resident, and also when the
    /// model's dimensionality could not be resolved.
    pub async fn info(&self) -> ModelInfo {
        let guard = self.resident.read().await;
        let Some(loaded) = guard.as_ref() else {
            return ModelInfo::not_loaded();
        };

        ModelInfo {
            model_name: Some(loaded.name.clone()),
            model_type: Some(loaded.model.model_type().to_string()),
            max_sequence_length: Some(loaded.max_sequence_length),
            embedding_dimensions: loaded.dimensions,
            is_loaded: loaded.dimensions.is_some(),
        }
    }

    /// Embeds `texts` with `model_name` (or the default), loading it first
    /// if needed.
    ///
    /// Texts are processed in chunks of `batch_size` (default
    /// `max_batch_size`). Output order matches input order. Either every
    /// text gets a vector or the call fails.
    pub async fn embed(
        &self,
        texts: &[String],
        model_name: Option<&str>,
        normalize: bool,
        batch_size: Option<usize>,
    ) -> Result<EmbeddingBatch, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::validation("texts", "Texts list cannot be empty"));
        }
        let batch_size = effective_batch_size(batch_size, self.config.max_batch_size);
        let name = self.resolve_name(model_name);

        let start = Instant::now();
        let guard = self.resident_guard(name).await?;
        let loaded = guard.as_ref().ok_or(EmbeddingError::NotLoaded)?;

        info!(
            "Generating embeddings for {} texts using model {}",
            texts.len(),
            loaded.name
        );

        let model = Arc::clone(&loaded.model);
        let owned = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || {
            run_batches(model.as_ref(), &owned, batch_size, normalize)
        })
        .await
        .map_err(|e| EmbeddingError::inference(anyhow!("Inference task failed: {}", e)))?
        .map_err(|source| {
            error!("Failed to generate embeddings: {:#}", source);
            EmbeddingError::Inference { source }
        })?;

        let dimensions = loaded
            .dimensions
            .or_else(|| embeddings.first().map(Vec::len))
            .unwrap_or(0);
        let model_name = loaded.name.clone();
        drop(guard);

        let processing_time = start.elapsed();
        self.metrics
            .record_batches(texts.len(), texts.len().div_ceil(batch_size));
        info!(
            "Generated embeddings for {} texts in {:.2} seconds",
            texts.len(),
            processing_time.as_secs_f64()
        );

        Ok(EmbeddingBatch {
            embeddings,
            model_name,
            dimensions,
            processing_time,
        })
    }

    /// Read guard on the slot with `name` resident, loading it first if needed.
    /// Retries when a concurrent swap replaces the model between the load
    /// and the read.
    async fn resident_guard(
        &self,
        name: &str,
    ) -> Result<RwLockReadGuard<'_, Option<LoadedModel>>, EmbeddingError> {
        loop {
            let guard = self.resident.read().await;
            if is_resident(&guard, name) {
                return Ok(guard);
            }
            drop(guard);
            self.load(Some(name)).await?;
        }
    }
}

fn is_resident(slot: &Option<LoadedModel>, name: &str) -> bool {
    slot.as_ref().is_some_and(|loaded| loaded.name == name)
}

/// Dimensions reported by the model, or from one sample inference.
/// A failed sample inference yields `None` instead of an error.
async fn resolve_dimensions(model: &Arc<dyn EmbeddingModel>) -> Option<usize> {
    if let Some(dimensions) = model.dimensions() {
        return Some(dimensions);
    }

    let model = Arc::clone(model);
    let sample = tokio::task::spawn_blocking(move || {
        model.embed_batch(&[DIMENSION_SAMPLE.to_string()])
    })
    .await;

    match sample {
        Ok(Ok(vectors)) => vectors.first().map(Vec::len),
        Ok(Err(e)) => {
            warn!("Dimension sample inference failed: {:#}", e);
            None
        }
        Err(e) => {
            warn!("Dimension sample task failed: {}", e);
            None
        }
    }
}
