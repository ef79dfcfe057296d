// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message broker abstraction: fan-out topics and at-least-once queues.

pub mod redis_broker;

pub use redis_broker::RedisBroker;

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize `message` to JSON, mapping encode failures to a
/// [`PipelineError::ValidationError`] the way a malformed outbound message
/// should be treated (a bug in the producer, not a broker hiccup).
pub fn encode<T: Serialize>(message: &T) -> Result<String, PipelineError> {
    Ok(serde_json::to_string(message)?)
}

/// The INITIALIZE topic: fanned out to the LEAD and ORDER queues.
pub const INITIALIZE_TOPIC: &str = "initialize-order";
/// Queue LEAD-WORKER consumes.
pub const LEAD_QUEUE: &str = "lead-worker";
/// Queue ORDER-WORKER consumes.
pub const ORDER_QUEUE: &str = "order-worker";
/// Queue STOCK-WORKER consumes.
pub const STOCK_QUEUE: &str = "product-stock";
/// Queue PAYMENT-WORKER consumes.
pub const PAYMENT_QUEUE: &str = "process-transaction";
/// Queue UPDATE-WORKER consumes.
pub const UPDATE_ORDER_QUEUE: &str = "update-order";

/// A message delivered off a queue, carrying enough to ack or nack it.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Opaque broker-assigned handle used to ack/nack this delivery.
    pub handle: String,
    /// Raw JSON payload.
    pub payload: String,
}

impl Delivery {
    /// Deserialize the payload as `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Publish/subscribe fabric used by every worker and the ingress service.
///
/// A "topic" fans out one message to every queue subscribed to it; a
/// "queue" is an at-least-once, single-subscriber work queue. Both are
/// addressed by plain string names (see the `*_TOPIC`/`*_QUEUE` constants
/// above) rather than vendor-specific ARNs/URLs.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a pre-encoded JSON message to every queue subscribed to
    /// `topic`. Use [`encode`] to build `payload`.
    async fn publish_topic(
        &self,
        topic: &str,
        subscribers: &[&str],
        payload: &str,
    ) -> Result<(), PipelineError>;

    /// Publish a pre-encoded JSON message directly onto `queue`. Use
    /// [`encode`] to build `payload`.
    async fn publish_queue(&self, queue: &str, payload: &str) -> Result<(), PipelineError>;

    /// Receive up to `max` pending messages from `queue`, moving them onto
    /// an in-flight processing list until acked or nacked.
    async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, PipelineError>;

    /// Acknowledge successful processing, removing the delivery from the
    /// in-flight list permanently.
    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError>;

    /// Return a delivery to the front of `queue` for redelivery.
    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError>;
}
