// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! UPDATE-WORKER: consumes order-status updates and transitions `Order`
//! through its state machine. This is the only worker allowed to mutate
//! `Order.status` after creation.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_core::error::PipelineError;
use pipeline_core::models::UpdateOrderMessage;
use pipeline_core::runner::RecordHandler;
use pipeline_core::store::Store;
use tracing::info;

/// UPDATE-WORKER's [`RecordHandler`].
pub struct UpdateWorkerHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> UpdateWorkerHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> RecordHandler for UpdateWorkerHandler<S> {
    async fn handle(&self, payload: &str) -> Result<(), PipelineError> {
        let message: UpdateOrderMessage = serde_json::from_str(payload)?;

        let order = self
            .store
            .get_order(&message.order_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("Order", &message.order_id))?;

        if !order.status.can_transition_to(message.status) {
            return Err(PipelineError::InvalidTransition {
                order_id: order.id,
                from: order.status.as_str().to_string(),
                to: message.status.as_str().to_string(),
            });
        }

        self.store
            .update_order_status(
                &order.id,
                message.status,
                message.reason.as_deref(),
                message.transaction_id.as_deref(),
            )
            .await?;

        info!(
            order_id = %order.id,
            from = order.status.as_str(),
            to = message.status.as_str(),
            "order transitioned"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::models::{AddressData, CustomerData, Order, OrderStatus};
    use pipeline_core::testing::InMemoryStore;

    fn customer() -> CustomerData {
        CustomerData {
            cpf: "12345678900".to_string(),
            email: "jane@example.com".to_string(),
            name: "Jane Doe".to_string(),
        }
    }

    fn address() -> AddressData {
        AddressData {
            street: "Main St".to_string(),
            number: "1".to_string(),
            neighborhood: "Centro".to_string(),
            city: "Sao Paulo".to_string(),
            state: "SP".to_string(),
            zip_code: "01234-567".to_string(),
            country: "BR".to_string(),
            complement: None,
        }
    }

    async fn seed_order(store: &InMemoryStore, order_id: &str, status: OrderStatus) {
        let now = chrono::Utc::now();
        let order = Order {
            id: order_id.to_string(),
            lead_id: "lead_1".to_string(),
            customer_data: customer(),
            items: vec![],
            total_items: 1,
            total_value: "59.98".parse().unwrap(),
            status,
            address_data: address(),
            created_at: now,
            updated_at: now,
            reason: None,
            transaction_id: None,
        };
        store.insert_order(&order).await.unwrap();
    }

    fn message(order_id: &str, status: OrderStatus) -> UpdateOrderMessage {
        UpdateOrderMessage {
            order_id: order_id.to_string(),
            status,
            reason: None,
            transaction_id: Some("txn-order_1".to_string()),
        }
    }

    #[tokio::test]
    async fn pending_to_processed_applies() {
        let store = Arc::new(InMemoryStore::new());
        seed_order(&store, "order_1", OrderStatus::Pending).await;
        let handler = UpdateWorkerHandler::new(store.clone());

        let payload = serde_json::to_string(&message("order_1", OrderStatus::Processed)).unwrap();
        handler.handle(&payload).await.unwrap();

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.transaction_id.as_deref(), Some("txn-order_1"));
    }

    #[tokio::test]
    async fn pending_to_cancelled_with_reason_applies() {
        let store = Arc::new(InMemoryStore::new());
        seed_order(&store, "order_1", OrderStatus::Pending).await;
        let handler = UpdateWorkerHandler::new(store.clone());

        let mut msg = message("order_1", OrderStatus::Cancelled);
        msg.reason = Some("Payment declined: card ending in 0000".to_string());
        let payload = serde_json::to_string(&msg).unwrap();
        handler.handle(&payload).await.unwrap();

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.reason.unwrap().starts_with("Payment declined"));
    }

    #[tokio::test]
    async fn processed_to_cancelled_is_rejected_and_order_unchanged() {
        let store = Arc::new(InMemoryStore::new());
        seed_order(&store, "order_1", OrderStatus::Processed).await;
        let handler = UpdateWorkerHandler::new(store.clone());

        let payload = serde_json::to_string(&message("order_1", OrderStatus::Cancelled)).unwrap();
        let err = handler.handle(&payload).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert!(!err.should_retry());

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
    }

    #[tokio::test]
    async fn cancelled_to_processed_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        seed_order(&store, "order_1", OrderStatus::Cancelled).await;
        let handler = UpdateWorkerHandler::new(store.clone());

        let payload = serde_json::to_string(&message("order_1", OrderStatus::Processed)).unwrap();
        let err = handler.handle(&payload).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn missing_order_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let handler = UpdateWorkerHandler::new(store);

        let payload = serde_json::to_string(&message("missing-order", OrderStatus::Processed)).unwrap();
        let err = handler.handle(&payload).await.unwrap_err();
        assert!(!err.should_retry());
    }
}
