// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::http_server::AppState;
use super::ApiError;
use crate::embeddings::{EmbeddingError, ModelInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
    pub health: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDoc {
    pub method: String,
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsResponse {
    pub title: String,
    pub version: String,
    pub routes: Vec<RouteDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadModelQuery {
    pub model_name: String,
}

const ROUTES: &[(&str, &str, &str)] = &[
    ("GET", "/", "Service name, version and links"),
    ("GET", "/health", "Liveness, version, model state and uptime"),
    ("GET", "/docs", "This route listing"),
    ("GET", "/model/info", "Resident model details; 503 when none is loaded"),
    (
        "POST",
        "/embeddings",
        "Embed 1-100 texts: {texts, model_name?, normalize=true, batch_size?}",
    ),
    ("POST", "/model/load?model_name=", "Load a model, replacing the resident one"),
    ("POST", "/model/unload", "Unload the resident model"),
];

pub async fn root_handler(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("{} API", state.settings.app_name),
        version: state.settings.app_version.clone(),
        docs: "/docs".to_string(),
        health: "/health".to_string(),
    })
}

/// Always healthy: the model is loaded lazily, so an empty slot is not a fault
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.settings.app_version.clone(),
        model_loaded: state.manager.is_loaded(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
    })
}

pub async fn docs_handler(State(state): State<AppState>) -> Json<DocsResponse> {
    Json(DocsResponse {
        title: state.settings.app_name.clone(),
        version: state.settings.app_version.clone(),
        routes: ROUTES
            .iter()
            .map(|(method, path, description)| RouteDoc {
                method: method.to_string(),
                path: path.to_string(),
                description: description.to_string(),
            })
            .collect(),
    })
}

pub async fn model_info_handler(
    State(state): State<AppState>,
) -> Result<Json<ModelInfo>, ApiError> {
    let info = state.manager.info().await;
    if !info.is_loaded {
        return Err(EmbeddingError::NotLoaded.into());
    }
    Ok(Json(info))
}

pub async fn load_model_handler(
    State(state): State<AppState>,
    query: Result<Query<LoadModelQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    let model_name = query.model_name.trim();
    if model_name.is_empty() {
        return Err(ApiError::validation(
            "model_name",
            "model_name cannot be empty",
        ));
    }

    state.manager.load(Some(model_name)).await?;
    Ok(Json(MessageResponse {
        message: format!("Model {} loaded successfully", model_name),
    }))
}

pub async fn unload_model_handler(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.manager.unload().await?;
    info!("Model unloaded via API");
    Ok(Json(MessageResponse {
        message: "Model unloaded successfully".to_string(),
    }))
}
