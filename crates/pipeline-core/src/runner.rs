// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic queue-consumer loop shared by every worker binary.
//!
//! A shutdown `Notify` is raced against the next batch receive via
//! `tokio::select!`. Records within one batch are processed sequentially
//! for predictable per-batch failure semantics; each worker process's
//! batches still run concurrently with every other worker instance since
//! nothing here is process-wide exclusive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::error::PipelineError;
use crate::messaging::{Delivery, MessageBroker};

/// One worker's per-record business logic, invoked once per delivery.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Process a single message payload. The retry/fatal distinction in
    /// the returned error drives ack-vs-nack.
    async fn handle(&self, payload: &str) -> Result<(), PipelineError>;
}

/// Backoff applied after a broker-level (not record-level) receive error,
/// so a down broker doesn't spin the loop.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Drives a [`RecordHandler`] against messages pulled from one queue until
/// shut down.
pub struct WorkerLoop<H: RecordHandler> {
    broker: Arc<dyn MessageBroker>,
    queue: &'static str,
    batch_size: usize,
    handler: H,
    shutdown: Arc<Notify>,
}

impl<H: RecordHandler> WorkerLoop<H> {
    /// Build a loop consuming `queue` in batches of `batch_size`.
    pub fn new(broker: Arc<dyn MessageBroker>, queue: &'static str, batch_size: usize, handler: H) -> Self {
        Self {
            broker,
            queue,
            batch_size,
            handler,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// A handle callers can use to signal shutdown from elsewhere (e.g. a
    /// ctrl-c listener spawned alongside `run`).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run until the shutdown handle is notified.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    break;
                }
                batch = self.broker.receive_batch(self.queue, self.batch_size) => {
                    match batch {
                        Ok(deliveries) => {
                            for delivery in &deliveries {
                                self.process_one(delivery).await;
                            }
                        }
                        Err(err) => {
                            error!(queue = self.queue, error = %err, "failed to receive batch");
                            tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    async fn process_one(&self, delivery: &Delivery) {
        match self.handler.handle(&delivery.payload).await {
            Ok(()) => {
                if let Err(err) = self.broker.ack(self.queue, delivery).await {
                    warn!(queue = self.queue, error = %err, "failed to ack processed delivery");
                }
            }
            Err(err) if err.should_retry() => {
                warn!(queue = self.queue, error = %err, "transient failure, requeuing for redelivery");
                if let Err(ack_err) = self.broker.nack(self.queue, delivery).await {
                    error!(queue = self.queue, error = %ack_err, "failed to nack delivery");
                }
            }
            Err(err) => {
                // Fatal per-record: logged and surrendered. A deployment
                // with a dead-letter queue wired up would route it there;
                // acking here simply stops redelivery.
                error!(queue = self.queue, error = %err, "fatal error processing record, dropping");
                if let Err(ack_err) = self.broker.ack(self.queue, delivery).await {
                    error!(queue = self.queue, error = %ack_err, "failed to ack fatal delivery");
                }
            }
        }
    }
}
