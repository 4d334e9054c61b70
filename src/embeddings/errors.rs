// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for model lifecycle and embedding generation

use thiserror::Error;

/// Errors raised by the model manager and the batch runner
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Request is malformed or out of bounds; never retried
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Fetching or initialising a model failed
    #[error("Failed to load model {model}: {source:#}")]
    Load {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    /// Batched inference failed; no partial output is returned
    #[error("Failed to generate embeddings: {source:#}")]
    Inference {
        #[source]
        source: anyhow::Error,
    },

    /// No model is resident
    #[error("No model is currently loaded. Model will be loaded on first embedding request.")]
    NotLoaded,
}

impl EmbeddingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EmbeddingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn inference(source: impl Into<anyhow::Error>) -> Self {
        EmbeddingError::Inference {
            source: source.into(),
        }
    }
}
