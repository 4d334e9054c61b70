// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingResponse type for POST /embeddings

use crate::embeddings::EmbeddingBatch;
use serde::{Deserialize, Serialize};

/// Response body for POST /embeddings
///
/// # Example
/// ```json
/// {
///   "embeddings": [[0.1, 0.2, ...]],
///   "model_name": "sentence-transformers/all-MiniLM-L6-v2",
///   "dimensions": 384,
///   "processing_time": 0.042,
///   "total_texts": 1
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input text, in input order
    pub embeddings: Vec<Vec<f32>>,

    /// Model used to generate the vectors
    pub model_name: String,

    /// Length of every vector
    pub dimensions: usize,

    /// Seconds spent loading (if needed) and running inference
    pub processing_time: f64,

    /// Number of texts processed
    pub total_texts: usize,
}

impl From<EmbeddingBatch> for EmbeddingResponse {
    fn from(batch: EmbeddingBatch) -> Self {
        EmbeddingResponse {
            total_texts: batch.embeddings.len(),
            embeddings: batch.embeddings,
            model_name: batch.model_name,
            dimensions: batch.dimensions,
            processing_time: batch.processing_time.as_secs_f64(),
        }
    }
}
