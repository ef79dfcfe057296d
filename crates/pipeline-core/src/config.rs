// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Configuration shared by every worker and the ingress service: where the
/// document store and message broker live, and how verbose to log.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL for the document store.
    pub database_url: String,
    /// Redis connection URL backing the message broker.
    pub redis_url: String,
    /// `RUST_LOG`/`tracing_subscriber::EnvFilter`-compatible log level.
    pub log_level: String,
}

impl Config {
    /// Load the shared configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `REDIS_URL`: Redis connection string for queues/topics
    ///
    /// Optional (with defaults):
    /// - `LOG_LEVEL`: tracing filter directive (default: `info`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let redis_url =
            std::env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            redis_url,
            log_level,
        })
    }
}

/// Ingress-specific configuration, layered on top of [`Config`].
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// Shared configuration.
    pub shared: Config,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl IngressConfig {
    /// Load ingress configuration from environment variables.
    ///
    /// Optional (with default):
    /// - `HTTP_BIND_ADDR`: socket address to bind (default: `0.0.0.0:8080`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let shared = Config::from_env()?;
        let bind_addr =
            std::env::var("HTTP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        Ok(Self { shared, bind_addr })
    }
}

/// Stock-reaper-specific configuration, layered on top of [`Config`].
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Shared configuration.
    pub shared: Config,
    /// How long a DECREASE entry must sit without a matching Order before
    /// it is considered orphaned.
    pub grace_period: Duration,
    /// How often the reaper scans for orphaned entries.
    pub poll_interval: Duration,
}

impl ReaperConfig {
    /// Load reaper configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `REAPER_GRACE_PERIOD_SECS` (default: 300)
    /// - `REAPER_POLL_INTERVAL_SECS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let shared = Config::from_env()?;

        let grace_period_secs: u64 = std::env::var("REAPER_GRACE_PERIOD_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("REAPER_GRACE_PERIOD_SECS", "must be a positive integer")
            })?;

        let poll_interval_secs: u64 = std::env::var("REAPER_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("REAPER_POLL_INTERVAL_SECS", "must be a positive integer")
            })?;

        Ok(Self {
            shared,
            grace_period: Duration::from_secs(grace_period_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
