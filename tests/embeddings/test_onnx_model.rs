// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX model tests against a real sentence-transformers export
//!
//! These download all-MiniLM-L6-v2 from the Hugging Face Hub and are
//! ignored by default. Run with:
//! `cargo test --test embeddings_tests -- --ignored`
//!
//! Set `EMBEDDINGS_TEST_MODEL_DIR` to a local copy to skip the download.

use embeddings_generator::embeddings::{
    EmbeddingModel, HubModelLoader, ModelLoader, OnnxEmbeddingModel,
};
use std::path::PathBuf;

const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn model_source() -> String {
    std::env::var("EMBEDDINGS_TEST_MODEL_DIR").unwrap_or_else(|_| MODEL_ID.to_string())
}

fn cache_dir() -> PathBuf {
    std::env::var("MODEL_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("embeddings-generator-test-models"))
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb)
}

#[tokio::test]
#[ignore] // Downloads ~90MB from the Hugging Face Hub
async fn test_minilm_produces_384_dimensions() {
    let loader = HubModelLoader::new(cache_dir());
    let model = loader.load(&model_source()).await.expect("model should load");

    assert_eq!(model.dimensions(), Some(384));
    assert_eq!(model.max_sequence_length(), Some(256));

    let texts = vec!["Hello world".to_string(), "Another text".to_string()];
    let vectors = model.embed_batch(&texts).expect("inference should succeed");
    assert_eq!(vectors.len(), 2);
    assert!(vectors.iter().all(|v| v.len() == 384));
}

#[tokio::test]
#[ignore] // Downloads ~90MB from the Hugging Face Hub
async fn test_similar_texts_score_higher() {
    let loader = HubModelLoader::new(cache_dir());
    let model = loader.load(&model_source()).await.expect("model should load");

    let texts = vec![
        "The cat sits on the mat".to_string(),
        "A cat is sitting on a mat".to_string(),
        "Quarterly revenue grew by ten percent".to_string(),
    ];
    let v = model.embed_batch(&texts).unwrap();

    assert!(cosine(&v[0], &v[1]) > cosine(&v[0], &v[2]));
}

#[tokio::test]
#[ignore] // Downloads ~90MB from the Hugging Face Hub
async fn test_padding_does_not_change_vectors() {
    let loader = HubModelLoader::new(cache_dir());
    let model = loader.load(&model_source()).await.expect("model should load");

    let short = "hi".to_string();
    let long = "a considerably longer sentence that forces padding of the short one".to_string();

    let alone = model.embed_batch(std::slice::from_ref(&short)).unwrap();
    let batched = model.embed_batch(&[short, long]).unwrap();

    assert!(cosine(&alone[0], &batched[0]) > 0.999);
}

#[test]
fn test_missing_files_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = HubModelLoader::local_artifacts(dir.path()).unwrap_err();
    assert!(err.to_string().contains("No ONNX model found"));
}

#[test]
fn test_missing_tokenizer_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("model.onnx"), b"not a graph").unwrap();

    let artifacts = HubModelLoader::local_artifacts(dir.path()).unwrap();
    let err = OnnxEmbeddingModel::from_artifacts("local", &artifacts, 1).unwrap_err();
    assert!(err.to_string().contains("Tokenizer file not found"));
}
