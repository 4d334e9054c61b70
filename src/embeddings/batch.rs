// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Batched inference
//!
//! Texts are split into contiguous chunks of at most `batch_size` items, each
//! chunk goes through the model in one call, and the results are concatenated
//! in input order. A failure in any chunk fails the whole run.

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::EmbeddingModel;

/// Resolves the batch size for a request: the caller's value, or
/// `default_batch_size` when absent or zero.
pub fn effective_batch_size(requested: Option<usize>, default_batch_size: usize) -> usize {
    match requested {
        Some(size) if size > 0 => size,
        _ => default_batch_size,
    }
}

/// Scales `vector` to unit Euclidean length. Zero vectors are left as is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Runs `texts` through `model` in chunks of `batch_size`.
pub fn run_batches(
    model: &dyn EmbeddingModel,
    texts: &[String],
    batch_size: usize,
    normalize: bool,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        bail!("batch size must be greater than 0");
    }

    let total_batches = texts.len().div_ceil(batch_size);
    let mut all_embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    let mut dimension: Option<usize> = None;

    for (index, chunk) in texts.chunks(batch_size).enumerate() {
        debug!(
            "Processing batch {}/{}: {} texts",
            index + 1,
            total_batches,
            chunk.len()
        );

        let batch_embeddings = model
            .embed_batch(chunk)
            .with_context(|| format!("Batch {} of {} failed", index + 1, total_batches))?;

        if batch_embeddings.len() != chunk.len() {
            bail!(
                "Model returned {} embeddings for a batch of {} texts",
                batch_embeddings.len(),
                chunk.len()
            );
        }

        for mut embedding in batch_embeddings {
            let expected = *dimension.get_or_insert(embedding.len());
            if embedding.len() != expected {
                bail!(
                    "Inconsistent embedding dimension: {} (expected {})",
                    embedding.len(),
                    expected
                );
            }
            if normalize {
                l2_normalize(&mut embedding);
            }
            all_embeddings.push(embedding);
        }
    }

    Ok(all_embeddings)
}
