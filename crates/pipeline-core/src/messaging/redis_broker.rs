// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Redis-backed [`MessageBroker`] using the reliable-queue pattern: a
//! message sits on `queue:<name>` until a consumer moves it onto
//! `queue:<name>:processing` with `BRPOPLPUSH`. `ack` removes it from the
//! processing list; `nack` pushes it back onto the main list for
//! redelivery.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{Delivery, MessageBroker};
use crate::error::PipelineError;

fn queue_key(queue: &str) -> String {
    format!("queue:{queue}")
}

fn processing_key(queue: &str) -> String {
    format!("queue:{queue}:processing")
}

/// Redis-backed message broker.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    /// Connect to Redis at `redis_url` and build a connection-managed,
    /// auto-reconnecting broker.
    pub async fn connect(redis_url: &str) -> Result<Self, PipelineError> {
        let client = redis::Client::open(redis_url).map_err(PipelineError::from)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Blocking pop timeout, in seconds, used by [`Self::receive_batch`].
    /// Short enough that a worker's shutdown signal is checked promptly.
    const RECEIVE_TIMEOUT_SECS: f64 = 1.0;
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish_topic(
        &self,
        _topic: &str,
        subscribers: &[&str],
        payload: &str,
    ) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        for queue in subscribers {
            let _: i64 = conn.lpush(queue_key(queue), payload).await?;
        }
        Ok(())
    }

    async fn publish_queue(&self, queue: &str, payload: &str) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(queue_key(queue), payload).await?;
        Ok(())
    }

    async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, PipelineError> {
        let mut conn = self.conn.clone();
        let mut deliveries = Vec::with_capacity(max);

        for _ in 0..max {
            let popped: Option<String> = conn
                .brpoplpush(queue_key(queue), processing_key(queue), Self::RECEIVE_TIMEOUT_SECS)
                .await?;

            match popped {
                Some(payload) => deliveries.push(Delivery {
                    handle: payload.clone(),
                    payload,
                }),
                None => break,
            }
        }

        Ok(deliveries)
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lrem(processing_key(queue), 1, &delivery.handle)
            .await?;
        Ok(())
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lrem(processing_key(queue), 1, &delivery.handle)
            .await?;
        let _: i64 = conn.lpush(queue_key(queue), &delivery.payload).await?;
        Ok(())
    }
}
