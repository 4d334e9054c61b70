// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embeddings tests
//!
//! Requests run in-process against the router with a fake loader, so they
//! cover validation, lazy loading, batching and normalisation without ONNX.

use crate::common::{l2_norm, FakeLoader, FakeModel, TestService, DEFAULT_MODEL, DIMENSIONS};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_first_request_loads_default_model() {
    let service = TestService::new(FakeLoader::new());
    assert!(!service.manager.is_loaded());

    let (status, body) = service
        .post_json("/embeddings", json!({ "texts": ["Hello world"] }))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["model_name"], DEFAULT_MODEL);
    assert_eq!(body["dimensions"], DIMENSIONS);
    assert_eq!(body["total_texts"], 1);
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    assert_eq!(service.loader.loaded_names(), vec![DEFAULT_MODEL.to_string()]);
    assert!(service.manager.is_loaded());
}

#[tokio::test]
async fn test_normalized_vectors_have_unit_length() {
    let service = TestService::new(FakeLoader::new());

    let (status, body) = service
        .post_json(
            "/embeddings",
            json!({ "texts": ["short", "a somewhat longer text"] }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let embeddings: Vec<Vec<f32>> = serde_json::from_value(body["embeddings"].clone()).unwrap();
    assert_eq!(embeddings.len(), 2);
    for vector in &embeddings {
        assert_eq!(vector.len(), DIMENSIONS);
        assert!((l2_norm(vector) - 1.0).abs() < 1e-3);
    }
}

#[tokio::test]
async fn test_unnormalized_vectors_returned_as_is() {
    let service = TestService::new(FakeLoader::new());

    let (status, body) = service
        .post_json(
            "/embeddings",
            json!({ "texts": ["hello"], "normalize": false }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let embeddings: Vec<Vec<f32>> = serde_json::from_value(body["embeddings"].clone()).unwrap();
    assert_eq!(embeddings[0], FakeModel::vector_for("hello", DIMENSIONS));
}

#[tokio::test]
async fn test_batch_size_splits_inference_and_keeps_order() {
    let service = TestService::new(FakeLoader::new());
    let texts = vec!["a", "bb", "ccc", "dddd", "eeeee"];

    let (status, body) = service
        .post_json(
            "/embeddings",
            json!({ "texts": texts, "batch_size": 2, "normalize": false }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(service.loader.batch_sizes(), vec![2, 2, 1]);

    let embeddings: Vec<Vec<f32>> = serde_json::from_value(body["embeddings"].clone()).unwrap();
    let lengths: Vec<f32> = embeddings.iter().map(|v| v[0]).collect();
    assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(body["total_texts"], 5);
}

#[tokio::test]
async fn test_batch_size_above_default_used_as_given() {
    let service = TestService::new(FakeLoader::new());
    let texts: Vec<String> = (0..40).map(|i| format!("text {}", i)).collect();

    let (status, _) = service
        .post_json("/embeddings", json!({ "texts": texts, "batch_size": 1000 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(service.loader.batch_sizes(), vec![40]);
}

#[tokio::test]
async fn test_zero_batch_size_falls_back_to_default() {
    let service = TestService::new(FakeLoader::new());
    let texts: Vec<String> = (0..40).map(|i| format!("text {}", i)).collect();

    let (status, body) = service
        .post_json("/embeddings", json!({ "texts": texts, "batch_size": 0 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_texts"], 40);
    assert_eq!(service.loader.batch_sizes(), vec![32, 8]);
}

#[tokio::test]
async fn test_named_model_replaces_resident_model() {
    let service = TestService::new(FakeLoader::new());

    let (status, _) = service
        .post_json("/embeddings", json!({ "texts": ["one"] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = service
        .post_json(
            "/embeddings",
            json!({ "texts": ["two"], "model_name": "test-org/other-model" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_name"], "test-org/other-model");
    assert_eq!(
        service.manager.current_model_name().await.as_deref(),
        Some("test-org/other-model")
    );
    assert_eq!(service.loader.load_count(), 2);
}

#[tokio::test]
async fn test_repeated_requests_load_once() {
    let service = TestService::new(FakeLoader::new());

    for _ in 0..3 {
        let (status, _) = service
            .post_json("/embeddings", json!({ "texts": ["again"] }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(service.loader.load_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_share_one_load() {
    let service = TestService::new(FakeLoader::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = service.app.clone();
            tokio::spawn(async move {
                let request = Request::post("/embeddings")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "texts": [format!("text {}", i)] }).to_string()))
                    .unwrap();
                app.oneshot(request).await.unwrap().status()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(service.loader.load_count(), 1);
}
