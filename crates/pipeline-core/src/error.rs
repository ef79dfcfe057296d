// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the order-processing pipeline.
//!
//! Provides a unified error type shared by the ingress service and every
//! worker, with a retry classification workers use to decide whether to
//! `ack` (permanent failure, route to dead-letter) or `nack` (transient,
//! let the broker redeliver) a record.

#![allow(dead_code)]

use std::fmt;

/// Result type using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while processing a record anywhere in the pipeline.
///
/// Covers `ValidationError`, `NotFound`, `Conflict`, `InsufficientStock`,
/// `GatewayError`, `TransientStore`/`TransientQueue`, and `Fatal` for
/// everything else.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PipelineError {
    /// A message or HTTP body failed schema/field-shape validation.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// A required reference (order, product, lead, transaction) was missing.
    NotFound {
        /// The kind of entity that was missing, e.g. `"Product"`.
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A conditional write's uniqueness precondition failed. Idempotent
    /// create paths treat this as success; everywhere else it is fatal.
    Conflict {
        /// The entity kind involved.
        entity: String,
        /// The identifier that already existed.
        id: String,
    },

    /// Phase A's stock pre-check (or STOCK-WORKER's DECREASE check) found
    /// insufficient current stock for the requested quantity.
    InsufficientStock {
        /// The product involved.
        product_id: String,
        /// Stock currently available.
        available: i64,
        /// Stock requested.
        requested: i64,
    },

    /// The simulated payment gateway returned an ERROR outcome.
    GatewayError {
        /// The simulated gateway message (timeout, service unavailable, ...).
        message: String,
    },

    /// A transient failure talking to the document store. Safe to retry.
    TransientStore {
        /// What operation failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// A transient failure talking to the message broker. Safe to retry.
    TransientQueue {
        /// What operation failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// An order status transition was attempted that the state machine
    /// does not allow.
    InvalidTransition {
        /// The order id.
        order_id: String,
        /// The order's current status.
        from: String,
        /// The status transition that was rejected.
        to: String,
    },

    /// Anything else. Treated as fatal per-record.
    Fatal {
        /// Error details.
        details: String,
    },
}

impl PipelineError {
    /// Machine-readable error code, stable across versions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::GatewayError { .. } => "GATEWAY_ERROR",
            Self::TransientStore { .. } => "TRANSIENT_STORE",
            Self::TransientQueue { .. } => "TRANSIENT_QUEUE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Fatal { .. } => "FATAL",
        }
    }

    /// Whether a worker should let the broker redeliver this record.
    ///
    /// Only `TransientStore`/`TransientQueue` are retryable; every other
    /// variant is fatal per-record (logged, acked, and — in a deployment
    /// with one wired up — routed to a dead-letter queue).
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::TransientStore { .. } | Self::TransientQueue { .. })
    }

    /// Whether this is a [`PipelineError::Conflict`] on an idempotent create
    /// path, which callers should treat as success rather than failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Construct a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Construct a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Construct a conflict error.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError { field, message } => {
                write!(f, "validation error for '{field}': {message}")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} '{id}' not found"),
            Self::Conflict { entity, id } => write!(f, "{entity} '{id}' already exists"),
            Self::InsufficientStock {
                product_id,
                available,
                requested,
            } => write!(
                f,
                "insufficient stock for product '{product_id}': {available} available, {requested} requested"
            ),
            Self::GatewayError { message } => write!(f, "gateway error: {message}"),
            Self::TransientStore { operation, details } => {
                write!(f, "transient store error during '{operation}': {details}")
            }
            Self::TransientQueue { operation, details } => {
                write!(f, "transient queue error during '{operation}': {details}")
            }
            Self::InvalidTransition {
                order_id,
                from,
                to,
            } => write!(
                f,
                "order '{order_id}' cannot transition from {from} to {to}"
            ),
            Self::Fatal { details } => write!(f, "fatal error: {details}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => PipelineError::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PipelineError::Conflict {
                    entity: "row".to_string(),
                    id: "unknown".to_string(),
                }
            }
            _ => PipelineError::TransientStore {
                operation: "query".to_string(),
                details: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::ValidationError {
            field: "body".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for PipelineError {
    fn from(err: redis::RedisError) -> Self {
        PipelineError::TransientQueue {
            operation: "redis".to_string(),
            details: err.to_string(),
        }
    }
}
