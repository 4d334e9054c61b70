// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Batch runner tests through the public API

use anyhow::{bail, Result};
use embeddings_generator::embeddings::{l2_normalize, run_batches, EmbeddingModel};
use std::sync::Mutex;

/// Returns the input index (parsed from the text) as the first component
struct IndexModel {
    dims: usize,
    fail_on_batch: Option<usize>,
    batches: Mutex<usize>,
}

impl IndexModel {
    fn new(dims: usize) -> Self {
        Self {
            dims,
            fail_on_batch: None,
            batches: Mutex::new(0),
        }
    }
}

impl EmbeddingModel for IndexModel {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut batches = self.batches.lock().unwrap();
        let current = *batches;
        *batches += 1;
        if self.fail_on_batch == Some(current) {
            bail!("inference failed on batch {}", current);
        }
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![2.0; self.dims];
                vector[0] = text.parse::<f32>().unwrap_or(-1.0);
                vector
            })
            .collect())
    }
}

fn numbered(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}

#[test]
fn test_output_order_matches_input_across_batches() {
    let model = IndexModel::new(4);
    let out = run_batches(&model, &numbered(23), 5, false).unwrap();

    assert_eq!(out.len(), 23);
    for (i, vector) in out.iter().enumerate() {
        assert_eq!(vector[0], i as f32);
    }
    assert_eq!(*model.batches.lock().unwrap(), 5);
}

#[test]
fn test_single_batch_when_size_exceeds_input() {
    let model = IndexModel::new(4);
    run_batches(&model, &numbered(3), 32, true).unwrap();
    assert_eq!(*model.batches.lock().unwrap(), 1);
}

#[test]
fn test_failure_in_any_batch_fails_whole_call() {
    let model = IndexModel {
        fail_on_batch: Some(1),
        ..IndexModel::new(4)
    };

    let err = run_batches(&model, &numbered(6), 2, true).unwrap_err();
    assert!(format!("{:#}", err).contains("inference failed on batch 1"));
}

#[test]
fn test_normalize_flag() {
    let model = IndexModel::new(3);
    let texts = vec!["3".to_string()];

    let raw = run_batches(&model, &texts, 1, false).unwrap();
    assert_eq!(raw[0], vec![3.0, 2.0, 2.0]);

    let normalized = run_batches(&model, &texts, 1, true).unwrap();
    let norm: f32 = normalized[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[test]
fn test_l2_normalize_leaves_zero_vector() {
    let mut zero = vec![0.0_f32; 4];
    l2_normalize(&mut zero);
    assert_eq!(zero, vec![0.0; 4]);

    let mut v = vec![3.0_f32, 4.0];
    l2_normalize(&mut v);
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}
