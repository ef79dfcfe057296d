// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PAYMENT-WORKER: consumes payment requests, simulates the gateway,
//! writes the authoritative [`pipeline_core::models::Transaction`], and
//! emits an order-status update reflecting the outcome.

pub mod gateway;

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_core::error::PipelineError;
use pipeline_core::masking::{mask_card_number, mask_cpf, mask_cvv};
use pipeline_core::messaging::{self, MessageBroker, UPDATE_ORDER_QUEUE};
use pipeline_core::models::{OrderStatus, ProcessTransactionMessage, Transaction, UpdateOrderMessage};
use pipeline_core::store::{InsertOutcome, Store};
use tracing::{info, warn};

use crate::gateway::GatewayOutcome;

/// PAYMENT-WORKER's [`pipeline_core::runner::RecordHandler`].
pub struct PaymentWorkerHandler<S: Store> {
    store: Arc<S>,
    broker: Arc<dyn MessageBroker>,
}

impl<S: Store> PaymentWorkerHandler<S> {
    pub fn new(store: Arc<S>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { store, broker }
    }

    async fn publish_update(&self, message: &UpdateOrderMessage) -> Result<(), PipelineError> {
        let payload = messaging::encode(message)?;
        self.broker.publish_queue(UPDATE_ORDER_QUEUE, &payload).await
    }

    /// Loads the order, runs the gateway simulation, writes the resulting
    /// transaction, and publishes the matching order-status update. The
    /// gateway's own `ERROR` outcome is ordinary data here, not a Rust
    /// error: it still produces a transaction and a CANCELLED update, same
    /// as a DECLINED outcome. A genuine failure to complete these steps
    /// (the order itself missing, a store/queue hiccup) is handled by the
    /// caller.
    async fn process(&self, message: &ProcessTransactionMessage) -> Result<(), PipelineError> {
        let order = self
            .store
            .get_order(&message.order_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("Order", &message.order_id))?;

        let (outcome, delay) = gateway::simulate(&message.payment_data.card_number, message.order_total_value);
        tokio::time::sleep(delay).await;

        let transaction_id = Transaction::id_for_order(&message.order_id);
        let now = chrono::Utc::now();

        let (payment_status, auth_code) = match &outcome {
            GatewayOutcome::Approved { auth_code } => (pipeline_core::models::PaymentStatus::Approved, Some(auth_code.clone())),
            GatewayOutcome::Declined => (pipeline_core::models::PaymentStatus::Declined, None),
            GatewayOutcome::Error { .. } => (pipeline_core::models::PaymentStatus::Error, None),
        };

        let transaction = Transaction {
            id: transaction_id.clone(),
            order_id: message.order_id.clone(),
            amount: message.order_total_value,
            payment_status,
            auth_code,
            processing_time_ms: delay.as_millis() as i64,
            masked_card_number: mask_card_number(&message.payment_data.card_number),
            masked_cvv: mask_cvv(&message.payment_data.cvv),
            masked_cpf: mask_cpf(&message.customer_data.cpf),
            address_data: message.address_data.clone(),
            customer_data: message.customer_data.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_transaction(&transaction).await? {
            InsertOutcome::Inserted => {
                info!(transaction_id = %transaction.id, status = transaction.payment_status.as_str(), "transaction recorded");
            }
            InsertOutcome::AlreadyExists => {
                // Redelivery of the same PAYMENT message: the deterministic
                // id makes this a conflict-as-success, so PAYMENT-WORKER is
                // not re-invoked a second time for the same order.
                info!(transaction_id = %transaction.id, "transaction already recorded, skipping re-dispatch");
                return Ok(());
            }
        }

        let (status, reason) = match &outcome {
            GatewayOutcome::Approved { .. } => (OrderStatus::Processed, None),
            GatewayOutcome::Declined => (
                OrderStatus::Cancelled,
                Some(format!(
                    "Payment declined: card ending in {}",
                    &transaction.masked_card_number[transaction.masked_card_number.len() - 4..]
                )),
            ),
            GatewayOutcome::Error { message } => (OrderStatus::Cancelled, Some(format!("Payment error: {message}"))),
        };

        let update = UpdateOrderMessage {
            order_id: order.id.clone(),
            status,
            reason,
            transaction_id: Some(transaction.id.clone()),
        };
        self.publish_update(&update).await?;

        Ok(())
    }
}

#[async_trait]
impl<S: Store> pipeline_core::runner::RecordHandler for PaymentWorkerHandler<S> {
    async fn handle(&self, payload: &str) -> Result<(), PipelineError> {
        let message: ProcessTransactionMessage = serde_json::from_str(payload)?;

        if message.order_total_value.is_sign_negative() {
            return Err(PipelineError::validation("orderTotalValue", "must not be negative"));
        }

        match self.process(&message).await {
            Ok(()) => Ok(()),
            Err(err) if err.should_retry() => {
                // A transient store/queue hiccup: no compensation, just
                // surrender the record for redelivery so `process` runs
                // again from a clean slate.
                Err(err)
            }
            Err(err) => {
                // A fatal failure before a transaction could be written
                // (most commonly: the order itself is missing). Attempt a
                // best-effort error-Transaction plus a CANCELLED
                // compensation, then propagate so the record is not retried.
                warn!(order_id = %message.order_id, error = %err, "payment processing failed, compensating with a cancellation");

                let now = chrono::Utc::now();
                let error_transaction = Transaction {
                    id: Transaction::id_for_order(&message.order_id),
                    order_id: message.order_id.clone(),
                    amount: message.order_total_value,
                    payment_status: pipeline_core::models::PaymentStatus::Error,
                    auth_code: None,
                    processing_time_ms: 0,
                    masked_card_number: mask_card_number(&message.payment_data.card_number),
                    masked_cvv: mask_cvv(&message.payment_data.cvv),
                    masked_cpf: mask_cpf(&message.customer_data.cpf),
                    address_data: message.address_data.clone(),
                    customer_data: message.customer_data.clone(),
                    created_at: now,
                    updated_at: now,
                };
                // Best-effort: if the order itself doesn't exist this may
                // still succeed, since transactions carry no FK to orders.
                let _ = self.store.insert_transaction(&error_transaction).await;

                let update = UpdateOrderMessage {
                    order_id: message.order_id.clone(),
                    status: OrderStatus::Cancelled,
                    reason: Some(format!("Payment processing error: {err}")),
                    transaction_id: Some(error_transaction.id),
                };
                // Best-effort: if this publish also fails, the order is
                // stuck PENDING until an operator intervenes.
                let _ = self.publish_update(&update).await;
                Err(err)
            }
        }
    }
}
