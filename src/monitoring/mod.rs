// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod metrics;

pub use metrics::{metrics_router, ServiceMetrics};
