// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The `POST /orders` handler.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pipeline_core::error::PipelineError;
use pipeline_core::ids::generate_order_id;
use pipeline_core::messaging::{self, INITIALIZE_TOPIC, LEAD_QUEUE, MessageBroker, ORDER_QUEUE};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::validation::{SubmitOrderRequest, validate_and_sanitize};

/// Shared ingress state: only a broker handle is needed, since INGRESS
/// never touches the document store directly — nothing is written to the
/// store on the synchronous path, so a failure here leaves no partial
/// state observable.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<dyn MessageBroker>,
}

#[derive(Debug, Serialize)]
struct SubmitOrderResponse {
    message: &'static str,
    order_id: String,
    status: &'static str,
}

/// `POST /orders`.
pub async fn submit_order(
    State(state): State<AppState>,
    body: Result<Json<SubmitOrderRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => {
            return validation_error_response(&rejection.to_string());
        }
    };

    let mut event = match validate_and_sanitize(request) {
        Ok(event) => event,
        Err(err) => return error_response(err),
    };

    let order_id = generate_order_id();
    event.order_id = order_id.clone();

    let payload = match messaging::encode(&event) {
        Ok(payload) => payload,
        Err(err) => return error_response(err),
    };

    if let Err(err) = state
        .broker
        .publish_topic(INITIALIZE_TOPIC, &[LEAD_QUEUE, ORDER_QUEUE], &payload)
        .await
    {
        error!(order_id = %order_id, error = %err, "failed to publish InitializeOrder event");
        return internal_error_response();
    }

    info!(order_id = %order_id, "order submitted");

    (
        StatusCode::ACCEPTED,
        Json(SubmitOrderResponse {
            message: "Order submission accepted",
            order_id,
            status: "submitted",
        }),
    )
        .into_response()
}

fn validation_error_response(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::ValidationError { .. } => validation_error_response(&err.to_string()),
        _ => {
            error!(error = %err, "unexpected error handling order submission");
            internal_error_response()
        }
    }
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
