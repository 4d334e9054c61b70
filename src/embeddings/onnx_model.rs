// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Wraps ONNX Runtime to run sentence-transformer models exported to ONNX
//! (e.g. `sentence-transformers/all-MiniLM-L6-v2`).
//!
//! Features:
//! - ONNX model loading from disk, pinned to the CPU execution provider
//! - Tokenization with truncation to the model's max sequence length
//! - Batch embedding generation with per-batch padding
//! - Attention-masked mean pooling over token embeddings
//! - Dimensions read from `config.json` when the model ships one

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array2, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::EmbeddingModel;

/// Files making up one model on disk
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    /// ONNX graph (`model.onnx`)
    pub model_path: PathBuf,
    /// HuggingFace tokenizer (`tokenizer.json`)
    pub tokenizer_path: PathBuf,
    /// Transformer config (`config.json`), provides `hidden_size`
    pub config_path: Option<PathBuf>,
    /// Sentence-transformers config (`sentence_bert_config.json`), provides `max_seq_length`
    pub sentence_config_path: Option<PathBuf>,
}

/// ONNX-based sentence-transformer model
///
/// The session is guarded by a mutex because `Session::run` needs exclusive
/// access; callers run inference from blocking threads.
pub struct OnnxEmbeddingModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
    hidden_size: Option<usize>,
    max_length: Option<usize>,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("hidden_size", &self.hidden_size)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Builds a model from files already on disk.
    ///
    /// This is blocking (graph optimisation, file IO); call it from
    /// `spawn_blocking` inside async code.
    ///
    /// # Errors
    /// - Model or tokenizer file missing or invalid
    /// - ONNX Runtime session initialisation fails
    pub fn from_artifacts(
        model_name: impl Into<String>,
        artifacts: &ModelArtifacts,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = artifacts.model_path.as_path();
        let tokenizer_path = artifacts.tokenizer_path.as_path();

        if !model_path.exists() {
            bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Initializing ONNX session for {} (CPU)", model_name);

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let hidden_size = artifacts
            .config_path
            .as_deref()
            .and_then(|path| read_json_usize(path, "hidden_size"));
        let max_length = artifacts
            .sentence_config_path
            .as_deref()
            .and_then(|path| read_json_usize(path, "max_seq_length"));

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        // Padding is applied per batch below
        tokenizer.with_padding(None);
        if let Some(max_length) = max_length {
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length,
                    ..Default::default()
                }))
                .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        }

        debug!(
            "Model {}: hidden_size={:?}, max_seq_length={:?}",
            model_name, hidden_size, max_length
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name,
            hidden_size,
            max_length,
        })
    }

    /// Returns the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Counts tokens in a text string (special tokens included)
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }
}

impl EmbeddingModel for OnnxEmbeddingModel {
    fn dimensions(&self) -> Option<usize> {
        self.hidden_size
    }

    fn max_sequence_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Tokenizes all texts, pads to the longest sequence and runs one
    /// inference call for the whole batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids_batch = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask_batch = Vec::with_capacity(texts.len() * max_len);
        let mut token_type_ids_batch = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let padding_needed = max_len - ids.len();

            input_ids_batch.extend(ids.iter().map(|&id| id as i64));
            input_ids_batch.extend(std::iter::repeat(0i64).take(padding_needed));
            attention_mask_batch.extend(mask.iter().map(|&m| m as i64));
            attention_mask_batch.extend(std::iter::repeat(0i64).take(padding_needed));
            token_type_ids_batch.extend(std::iter::repeat(0i64).take(max_len));
        }

        let attention_mask_for_pooling = attention_mask_batch.clone();

        let input_ids_array = Array2::from_shape_vec((texts.len(), max_len), input_ids_batch)
            .context("Failed to create batch input_ids array")?;
        let attention_mask_array =
            Array2::from_shape_vec((texts.len(), max_len), attention_mask_batch)
                .context("Failed to create batch attention_mask array")?;
        let token_type_ids_array =
            Array2::from_shape_vec((texts.len(), max_len), token_type_ids_batch)
                .context("Failed to create batch token_type_ids array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?,
                "token_type_ids" => Value::from_array(token_type_ids_array)?
            ])
            .context("ONNX inference failed")?;

        // Index [0]: output names differ between exports
        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let embeddings = match output_array.ndim() {
            // Already pooled: [batch, hidden]
            2 => output_array
                .axis_iter(Axis(0))
                .map(|row| row.iter().copied().collect::<Vec<f32>>())
                .collect::<Vec<_>>(),
            // Token embeddings: [batch, seq_len, hidden]
            3 => {
                let mut pooled_batch = Vec::with_capacity(texts.len());
                for batch_idx in 0..texts.len() {
                    let item = output_array.index_axis(Axis(0), batch_idx);
                    let seq_len = item.shape()[0];
                    let hidden_dim = item.shape()[1];
                    let item_mask =
                        &attention_mask_for_pooling[batch_idx * max_len..(batch_idx + 1) * max_len];

                    let mut pooled = vec![0.0f32; hidden_dim];
                    let mut sum_mask = 0.0f32;
                    for i in 0..seq_len.min(max_len) {
                        let mask_value = item_mask[i] as f32;
                        sum_mask += mask_value;
                        for (j, slot) in pooled.iter_mut().enumerate() {
                            *slot += item[[i, j]] * mask_value;
                        }
                    }
                    for val in &mut pooled {
                        *val /= sum_mask.max(1e-9);
                    }
                    pooled_batch.push(pooled);
                }
                pooled_batch
            }
            _ => bail!(
                "Model outputs unexpected shape: {:?} (expected [batch, hidden] or [batch, seq_len, hidden])",
                output_array.shape()
            ),
        };

        if let Some(expected) = self.hidden_size {
            if let Some((i, emb)) = embeddings
                .iter()
                .enumerate()
                .find(|(_, emb)| emb.len() != expected)
            {
                bail!(
                    "Unexpected embedding dimension at index {}: {} (expected {})",
                    i,
                    emb.len(),
                    expected
                );
            }
        }

        Ok(embeddings)
    }
}

fn read_json_usize(path: &Path, key: &str) -> Option<usize> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value.get(key)?.as_u64().map(|v| v as usize)
}
