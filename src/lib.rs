// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod embeddings;
pub mod logging;
pub mod monitoring;

pub use api::{create_app, AppState};
pub use config::Settings;
pub use embeddings::{EmbeddingError, EmbeddingModelConfig, EmbeddingModelManager, HubModelLoader};
pub use monitoring::ServiceMetrics;
