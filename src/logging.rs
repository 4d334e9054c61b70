// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when it is set; otherwise the configured `LOG_LEVEL` is
//! used as the default directive.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps a log level name to a tracing level.
///
/// Accepts tracing names and the Python-style `WARNING` / `CRITICAL` aliases,
/// case-insensitively.
pub fn parse_log_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global fmt subscriber. Fails if one is already installed.
pub fn init(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level)
        .ok_or_else(|| anyhow!("Unrecognised log level: {}", log_level))?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
