// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide service settings
//!
//! Every field can be set through an environment variable (optionally read
//! from a `.env` file) or overridden on the command line. Settings are
//! resolved once at startup and never mutated afterwards.

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::fmt;
use std::path::PathBuf;

use crate::logging::parse_log_level;

/// Service settings
#[derive(Parser, Clone)]
#[command(name = "embeddings-generator")]
#[command(about = "Generate text embeddings with CPU-only Hugging Face models", long_about = None)]
pub struct Settings {
    /// Service name reported by the root endpoint
    #[arg(long, env = "APP_NAME", default_value = "Embeddings Generator")]
    pub app_name: String,

    /// Service version reported by root and health endpoints
    #[arg(long, env = "APP_VERSION", default_value = "0.1.0")]
    pub app_version: String,

    /// Include error details in unhandled 500 responses
    #[arg(
        long,
        env = "DEBUG",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Log level (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Bind address for the HTTP API
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the HTTP API
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Runtime worker threads
    #[arg(long, env = "WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Model loaded when a request does not name one
    #[arg(
        long,
        env = "DEFAULT_MODEL_NAME",
        default_value = "sentence-transformers/all-MiniLM-L6-v2"
    )]
    pub default_model_name: String,

    /// Directory where fetched model artifacts are cached
    #[arg(long, env = "MODEL_CACHE_DIR", default_value = "/app/models")]
    pub model_cache_dir: PathBuf,

    /// Texts per inference batch when a request does not set `batch_size`
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 32)]
    pub max_batch_size: usize,

    /// Longest accepted input text, in characters
    #[arg(long, env = "MAX_SEQUENCE_LENGTH", default_value_t = 512)]
    pub max_sequence_length: usize,

    /// Serve Prometheus metrics on `metrics_port`
    #[arg(
        long,
        env = "ENABLE_METRICS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_metrics: bool,

    /// Port for the metrics endpoint
    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Reserved for token signing; not enforced by any route
    #[arg(long, env = "SECRET_KEY", default_value = "your-secret-key-here", hide_env_values = true)]
    pub secret_key: String,

    /// Reserved for token expiry; not enforced by any route
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 30)]
    pub access_token_expire_minutes: u64,
}

impl Settings {
    /// Reads `.env`, the environment and the process arguments
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let settings = Self::try_parse().context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `.env` and the environment only, ignoring process arguments
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_args(std::iter::empty::<String>())
    }

    /// Parses settings from explicit arguments (environment still applies)
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let argv = std::iter::once(std::ffi::OsString::from("embeddings-generator"))
            .chain(args.into_iter().map(Into::into));
        let settings = Self::try_parse_from(argv).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            bail!("MAX_BATCH_SIZE must be greater than 0");
        }
        if self.max_sequence_length == 0 {
            bail!("MAX_SEQUENCE_LENGTH must be greater than 0");
        }
        if self.workers == 0 {
            bail!("WORKERS must be greater than 0");
        }
        if self.host.trim().is_empty() {
            bail!("HOST cannot be empty");
        }
        if self.default_model_name.trim().is_empty() {
            bail!("DEFAULT_MODEL_NAME cannot be empty");
        }
        if parse_log_level(&self.log_level).is_none() {
            bail!("Unrecognised LOG_LEVEL: {}", self.log_level);
        }
        Ok(())
    }

    /// Host and port for the HTTP API. The host may be a name or an IP.
    pub fn api_endpoint(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    /// Host and port for the metrics endpoint
    pub fn metrics_endpoint(&self) -> (&str, u16) {
        (self.host.as_str(), self.metrics_port)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("workers", &self.workers)
            .field("default_model_name", &self.default_model_name)
            .field("model_cache_dir", &self.model_cache_dir)
            .field("max_batch_size", &self.max_batch_size)
            .field("max_sequence_length", &self.max_sequence_length)
            .field("enable_metrics", &self.enable_metrics)
            .field("metrics_port", &self.metrics_port)
            .field("secret_key", &"<redacted>")
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .finish()
    }
}
