// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text embedding models and their lifecycle
//!
//! - [`EmbeddingModel`]: capability interface every inference backend implements
//! - [`OnnxEmbeddingModel`]: ONNX Runtime sentence-transformer backend
//! - [`ModelLoader`] / [`HubModelLoader`]: turn a model identifier into a model
//! - [`EmbeddingModelManager`]: owns the single resident model
//! - [`batch`]: fixed-size chunking and normalisation

use anyhow::Result;

pub mod batch;
pub mod errors;
pub mod loader;
pub mod model_manager;
pub mod onnx_model;

pub use batch::{l2_normalize, run_batches};
pub use errors::EmbeddingError;
pub use loader::{HubModelLoader, ModelLoader};
pub use model_manager::{EmbeddingBatch, EmbeddingModelConfig, EmbeddingModelManager, ModelInfo};
pub use onnx_model::{ModelArtifacts, OnnxEmbeddingModel};

/// Type tag reported for sentence-transformer style models
pub const SENTENCE_TRANSFORMER: &str = "sentence-transformer";

/// An inference-capable embedding model
///
/// `dimensions` and `max_sequence_length` are optional capabilities. When a
/// model cannot report its dimensionality the manager runs one sample
/// inference at load time instead.
pub trait EmbeddingModel: Send + Sync {
    /// Type tag reported by `/model/info`
    fn model_type(&self) -> &str {
        SENTENCE_TRANSFORMER
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }

    fn max_sequence_length(&self) -> Option<usize> {
        None
    }

    /// Embeds one batch, returning one raw (unnormalised) vector per text in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
