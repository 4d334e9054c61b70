// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! EmbeddingRequest type for POST /embeddings
//!
//! Validation runs before any model work, so a rejected request never
//! triggers a load or an inference.

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Most texts accepted in one request
pub const MAX_TEXTS_PER_REQUEST: usize = 100;

/// Request body for POST /embeddings
///
/// # Example
/// ```json
/// {
///   "texts": ["Hello world", "Another text"],
///   "model_name": "sentence-transformers/all-MiniLM-L6-v2",
///   "normalize": true,
///   "batch_size": 16
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Texts to embed (1-100 items)
    pub texts: Vec<String>,

    /// Model to use; the configured default when absent
    #[serde(default)]
    pub model_name: Option<String>,

    /// Scale vectors to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Texts per inference call; the configured default when absent
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_normalize() -> bool {
    true
}

impl EmbeddingRequest {
    /// Validates the request
    ///
    /// # Validation Rules
    /// 1. **texts**: 1-100 items
    /// 2. **text length**: no text longer than `max_sequence_length` characters
    ///
    /// `batch_size` is not checked: 0 or absent means the configured default.
    pub fn validate(&self, max_sequence_length: usize) -> Result<(), ApiError> {
        if self.texts.is_empty() {
            return Err(ApiError::validation(
                "texts",
                "texts array must contain at least 1 item",
            ));
        }

        if self.texts.len() > MAX_TEXTS_PER_REQUEST {
            return Err(ApiError::validation(
                "texts",
                format!(
                    "texts array cannot contain more than {} items (got {})",
                    MAX_TEXTS_PER_REQUEST,
                    self.texts.len()
                ),
            ));
        }

        for (index, text) in self.texts.iter().enumerate() {
            let length = text.chars().count();
            if length > max_sequence_length {
                return Err(ApiError::validation(
                    format!("texts[{}]", index),
                    format!(
                        "Text at index {} exceeds maximum length of {} characters (got {})",
                        index, max_sequence_length, length
                    ),
                ));
            }
        }

        Ok(())
    }
}
