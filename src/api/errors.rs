// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

use crate::embeddings::EmbeddingError;

/// Body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: Option<String>,
    pub status_code: u16,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    ValidationError {
        field: String,
        message: String,
    },
    NotFound(String),
    ServiceUnavailable(String),
    InternalError(String),
    /// Uncaught failure; `detail` is only populated in debug mode
    Unhandled {
        detail: Option<String>,
    },
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error, detail) = match self {
            ApiError::ValidationError { field, message } => (
                "Validation error",
                Some(format!("{}: {}", field, message)),
            ),
            ApiError::NotFound(msg) => ("Not found", Some(msg.clone())),
            ApiError::ServiceUnavailable(msg) => ("Service unavailable", Some(msg.clone())),
            ApiError::InternalError(msg) => ("Internal error", Some(msg.clone())),
            ApiError::Unhandled { detail } => ("Internal server error", detail.clone()),
        };

        ErrorResponse {
            error: error.to_string(),
            detail,
            status_code: self.status_code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } => 422,
            ApiError::NotFound(_) => 404,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) | ApiError::Unhandled { .. } => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unhandled { .. } => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Validation { field, message } => ApiError::validation(field, message),
            EmbeddingError::NotLoaded => ApiError::ServiceUnavailable(err.to_string()),
            EmbeddingError::Load { .. } | EmbeddingError::Inference { .. } => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}
