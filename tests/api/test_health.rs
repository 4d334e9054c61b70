// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Root, health and docs endpoint tests

use crate::common::{FakeLoader, TestService};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_root_reports_name_and_links() {
    let service = TestService::new(FakeLoader::new());
    let (status, body) = service.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Embeddings Generator API");
    assert_eq!(body["version"], "0.1.0");
    assert_eq!(body["docs"], "/docs");
    assert_eq!(body["health"], "/health");
}

#[tokio::test]
async fn test_health_is_ok_before_any_load() {
    let service = TestService::new(FakeLoader::new());
    let (status, body) = service.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
    assert!(body["uptime_seconds"].as_f64().unwrap() >= 0.0);
    assert_eq!(service.loader.load_count(), 0);
}

#[tokio::test]
async fn test_health_reflects_loaded_model() {
    let service = TestService::new(FakeLoader::new());
    service.post_json("/embeddings", json!({ "texts": ["a"] })).await;

    let (status, body) = service.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_health_ok_after_failed_load() {
    let service = TestService::new(FakeLoader::new().failing("test-org/missing"));
    service.post("/model/load?model_name=test-org/missing").await;

    let (status, body) = service.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_docs_lists_every_route() {
    let service = TestService::new(FakeLoader::new());
    let (status, body) = service.get("/docs").await;

    assert_eq!(status, StatusCode::OK);
    let paths: Vec<&str> = body["routes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|route| route["path"].as_str().unwrap())
        .collect();
    for expected in ["/", "/health", "/model/info", "/embeddings", "/model/unload"] {
        assert!(paths.contains(&expected), "missing {}", expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_answers_while_model_is_loading() {
    let service = TestService::new(FakeLoader::new().with_delay(Duration::from_secs(3)));
    let manager = Arc::clone(&service.manager);
    let load = tokio::spawn(async move { manager.load(None).await });

    while service.loader.load_count() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = timeout(Duration::from_millis(500), service.get("/health"))
        .await
        .expect("/health must not wait for the load");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);

    let (status, _) = timeout(Duration::from_millis(500), service.get("/model/info"))
        .await
        .expect("/model/info must not wait for the load");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    load.await.unwrap().unwrap();
    let (_, body) = service.get("/health").await;
    assert_eq!(body["model_loaded"], true);
}
