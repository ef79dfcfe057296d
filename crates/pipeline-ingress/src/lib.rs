// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP ingress for the order-processing pipeline.
//!
//! The only synchronous operation in the system: validates and sanitizes
//! a `POST /orders` body, assigns an `orderId`, and publishes an
//! `InitializeOrder` event to the INITIALIZE topic. Nothing is written to
//! the document store on this path, so a failure here leaves no partial
//! state.

pub mod handlers;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use pipeline_core::messaging::MessageBroker;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the ingress router. Split out of `main` so integration tests can
/// mount it against an in-memory broker.
pub fn build_router(broker: Arc<dyn MessageBroker>) -> Router {
    Router::new()
        .route("/orders", post(handlers::submit_order))
        .with_state(AppState { broker })
        .layer(TraceLayer::new_for_http())
}
