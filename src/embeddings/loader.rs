// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model loading
//!
//! [`HubModelLoader`] resolves a model identifier to files on disk and builds
//! an [`OnnxEmbeddingModel`]. The identifier is either a local directory
//! holding the artifacts or a Hugging Face Hub repository id, fetched into
//! the cache directory with `hf-hub`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hf_hub::api::tokio::{ApiBuilder, ApiRepo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{EmbeddingModel, ModelArtifacts, OnnxEmbeddingModel};

/// ONNX graph locations tried in order; sentence-transformers repos keep theirs under `onnx/`
const ONNX_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx"];
const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";
const SENTENCE_CONFIG_FILE: &str = "sentence_bert_config.json";

/// Turns a model identifier into a ready-to-run model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>>;
}

/// Loads ONNX sentence-transformer models from a local directory or the Hugging Face Hub
#[derive(Debug, Clone)]
pub struct HubModelLoader {
    cache_dir: PathBuf,
    intra_threads: usize,
}

impl HubModelLoader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            intra_threads: 4,
        }
    }

    /// Sets ONNX Runtime intra-op threads (default 4)
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Locates artifacts in a local model directory
    pub fn local_artifacts(dir: &Path) -> Result<ModelArtifacts> {
        let model_path = ONNX_CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.exists())
            .ok_or_else(|| anyhow!("No ONNX model found in {}", dir.display()))?;

        let optional = |name: &str| Some(dir.join(name)).filter(|path| path.exists());

        Ok(ModelArtifacts {
            model_path,
            tokenizer_path: dir.join(TOKENIZER_FILE),
            config_path: optional(CONFIG_FILE),
            sentence_config_path: optional(SENTENCE_CONFIG_FILE),
        })
    }

    /// Fetches artifacts for `repo_id` into the cache directory
    async fn hub_artifacts(&self, repo_id: &str) -> Result<ModelArtifacts> {
        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(false)
            .build()
            .context("Failed to initialise Hugging Face Hub client")?;
        let repo = api.model(repo_id.to_string());

        let model_path = fetch_first(&repo, ONNX_CANDIDATES)
            .await
            .with_context(|| format!("No ONNX export found in {}", repo_id))?;
        let tokenizer_path = repo
            .get(TOKENIZER_FILE)
            .await
            .with_context(|| format!("Failed to fetch {} from {}", TOKENIZER_FILE, repo_id))?;

        let config_path = repo.get(CONFIG_FILE).await.ok();
        let sentence_config_path = repo.get(SENTENCE_CONFIG_FILE).await.ok();

        Ok(ModelArtifacts {
            model_path,
            tokenizer_path,
            config_path,
            sentence_config_path,
        })
    }
}

async fn fetch_first(repo: &ApiRepo, candidates: &[&str]) -> Result<PathBuf> {
    let mut last_error = None;
    for candidate in candidates {
        match repo.get(candidate).await {
            Ok(path) => return Ok(path),
            Err(e) => {
                debug!("{} not available: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => anyhow!(e),
        None => anyhow!("no candidates given"),
    })
}

#[async_trait]
impl ModelLoader for HubModelLoader {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>> {
        let local_dir = Path::new(model_name);
        let artifacts = if local_dir.is_dir() {
            info!("Loading model {} from local directory", model_name);
            Self::local_artifacts(local_dir)?
        } else {
            info!(
                "Fetching model {} into {}",
                model_name,
                self.cache_dir.display()
            );
            self.hub_artifacts(model_name).await?
        };

        let name = model_name.to_string();
        let threads = self.intra_threads;
        let model = tokio::task::spawn_blocking(move || {
            OnnxEmbeddingModel::from_artifacts(name, &artifacts, threads)
        })
        .await
        .context("Model initialisation task failed")??;

        Ok(Arc::new(model))
    }
}
