// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! Provides the POST /embeddings endpoint.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::embeddings_handler;
pub use request::{EmbeddingRequest, MAX_TEXTS_PER_REQUEST};
pub use response::EmbeddingResponse;
