// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embeddings handler

use crate::api::embed::{EmbeddingRequest, EmbeddingResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::warn;

/// POST /embeddings handler
///
/// Validates the request, makes sure the requested model is resident, then
/// embeds the texts in batches.
///
/// # Errors
/// - 422: malformed body, 0 or more than 100 texts, a text longer than
///   `max_sequence_length` characters
/// - 500: the model failed to load or inference failed
pub async fn embeddings_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let Json(request) = payload?;

    if let Err(e) = request.validate(state.settings.max_sequence_length) {
        warn!("Rejected embedding request: {}", e);
        state.metrics.record_request(false, None);
        return Err(e);
    }

    let result = state
        .manager
        .embed(
            &request.texts,
            request.model_name.as_deref(),
            request.normalize,
            request.batch_size,
        )
        .await;

    match result {
        Ok(batch) => {
            state
                .metrics
                .record_request(true, Some(batch.processing_time));
            Ok(Json(EmbeddingResponse::from(batch)))
        }
        Err(e) => {
            state.metrics.record_request(false, None);
            Err(ApiError::from(e))
        }
    }
}
