// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ORDER-WORKER: the crux of the pipeline. Consumes InitializeOrder
//! events and runs five ordered phases — enrichment, stock reservation,
//! lead association, order creation, payment dispatch — applying the
//! compensation each phase's failure calls for.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use pipeline_core::error::PipelineError;
use pipeline_core::ids::generate_order_id;
use pipeline_core::lead_dedup::find_or_create_lead;
use pipeline_core::messaging::{self, MessageBroker, PAYMENT_QUEUE, STOCK_QUEUE};
use pipeline_core::models::{
    EnrichedOrderItem, InitializeOrderEvent, Order, OrderItemRequest, OrderStatus,
    ProcessTransactionMessage, StockOperation, StockUpdateMessage,
};
use pipeline_core::store::{InsertOutcome, Store};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// ORDER-WORKER's [`pipeline_core::runner::RecordHandler`].
pub struct OrderWorkerHandler<S: Store> {
    store: Arc<S>,
    broker: Arc<dyn MessageBroker>,
}

impl<S: Store> OrderWorkerHandler<S> {
    pub fn new(store: Arc<S>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { store, broker }
    }

    /// Phase A. Loads and prices each requested item against the
    /// catalog. A product that cannot be found degrades to a zero-value
    /// placeholder line item rather than failing the order (boundary
    /// behavior distinct from an inactive product, which fails outright —
    /// see the design ledger for why these two near-identical cases
    /// diverge). Stock is checked only for items with `hasStockControl`.
    async fn enrich_items(&self, items: &[OrderItemRequest]) -> Result<Vec<EnrichedOrderItem>, PipelineError> {
        let mut enriched = Vec::with_capacity(items.len());

        for item in items {
            let Some(product) = self.store.get_product(&item.id).await? else {
                warn!(product_id = %item.id, "product not found, enriching as unknown");
                enriched.push(EnrichedOrderItem {
                    id: item.id.clone(),
                    quantity: item.quantity,
                    product_name: "Unknown Product".to_string(),
                    unit_price: Decimal::ZERO,
                    total_price: Decimal::ZERO,
                    has_stock_control: false,
                });
                continue;
            };

            if !product.is_active {
                return Err(PipelineError::validation(
                    "items[].id",
                    format!("product '{}' is not active", item.id),
                ));
            }

            if product.has_stock_control && item.quantity > 0 {
                let available = self.store.current_stock(&product.id).await?;
                if available < item.quantity {
                    return Err(PipelineError::InsufficientStock {
                        product_id: product.id.clone(),
                        available,
                        requested: item.quantity,
                    });
                }
            }

            let total_price = product.price * Decimal::from(item.quantity);
            enriched.push(EnrichedOrderItem {
                id: product.id,
                quantity: item.quantity,
                product_name: product.name,
                unit_price: product.price,
                total_price,
                has_stock_control: product.has_stock_control,
            });
        }

        Ok(enriched)
    }

    /// Phase B. Publishes one DECREASE message per stock-controlled item
    /// with a positive quantity, fanned out concurrently. Already-published
    /// messages are not rolled back on a later publish failure; the
    /// stock-reaper repairs any resulting orphan.
    async fn reserve_stock(&self, order_id: &str, items: &[EnrichedOrderItem]) -> Result<(), PipelineError> {
        let publishes = items
            .iter()
            .filter(|item| item.has_stock_control && item.quantity > 0)
            .map(|item| {
                let message = StockUpdateMessage {
                    product_id: item.id.clone(),
                    quantity: item.quantity,
                    operation: StockOperation::Decrease,
                    order_id: Some(order_id.to_string()),
                    reason: "Order sale".to_string(),
                };
                self.publish_stock_update(message)
            });

        try_join_all(publishes).await?;
        Ok(())
    }

    async fn publish_stock_update(&self, message: StockUpdateMessage) -> Result<(), PipelineError> {
        let payload = messaging::encode(&message)?;
        self.broker.publish_queue(STOCK_QUEUE, &payload).await
    }

    /// Phase E. Dispatches the payment request if the event carried
    /// payment and address data. Failure here is logged, not propagated:
    /// the order already exists in PENDING and a redrive or manual
    /// dispatch is expected to cover it.
    async fn dispatch_payment(&self, order: &Order, event: &InitializeOrderEvent) {
        let (Some(payment_data), Some(address_data)) = (&event.payment_data, &event.address_data) else {
            warn!(order_id = %order.id, "no payment/address data, skipping payment dispatch");
            return;
        };

        let message = ProcessTransactionMessage {
            order_id: order.id.clone(),
            order_total_value: order.total_value,
            payment_data: payment_data.clone(),
            address_data: address_data.clone(),
            customer_data: order.customer_data.clone(),
        };

        let publish = async {
            let payload = messaging::encode(&message)?;
            self.broker.publish_queue(PAYMENT_QUEUE, &payload).await
        };

        if let Err(err) = publish.await {
            warn!(order_id = %order.id, error = %err, "failed to dispatch payment request");
        }
    }
}

#[async_trait]
impl<S: Store> pipeline_core::runner::RecordHandler for OrderWorkerHandler<S> {
    async fn handle(&self, payload: &str) -> Result<(), PipelineError> {
        let event: InitializeOrderEvent = serde_json::from_str(payload)?;

        let enriched_items = self.enrich_items(&event.items).await?;
        let (total_items, total_value) = Order::totals(&enriched_items);

        // ORDER-WORKER mints its own order id if the event didn't already
        // carry one (defensive; INGRESS always assigns one in practice).
        let order_id = if event.order_id.is_empty() {
            generate_order_id()
        } else {
            event.order_id.clone()
        };

        self.reserve_stock(&order_id, &enriched_items).await?;

        let lead = find_or_create_lead(
            self.store.as_ref(),
            &event.customer_data.cpf,
            &event.customer_data.email,
            &event.customer_data.name,
        )
        .await?;

        let now = chrono::Utc::now();
        let order = Order {
            id: order_id.clone(),
            lead_id: lead.id,
            customer_data: event.customer_data.clone(),
            items: enriched_items,
            total_items,
            total_value,
            status: OrderStatus::Pending,
            address_data: event.address_data.clone().unwrap_or_else(|| pipeline_core::models::AddressData {
                street: String::new(),
                number: String::new(),
                neighborhood: String::new(),
                city: String::new(),
                state: String::new(),
                zip_code: String::new(),
                country: String::new(),
                complement: None,
            }),
            created_at: now,
            updated_at: now,
            reason: None,
            transaction_id: None,
        };

        match self.store.insert_order(&order).await? {
            InsertOutcome::Inserted => {
                info!(order_id = %order.id, total_value = %order.total_value, "order created");
            }
            InsertOutcome::AlreadyExists => {
                // Duplicate delivery of the same order id: PAYMENT-WORKER
                // is not re-invoked, matching replay semantics.
                info!(order_id = %order.id, "duplicate order delivery, treated as success");
                return Ok(());
            }
        }

        self.dispatch_payment(&order, &event).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::models::{AddressData, CustomerData, PaymentData, Product};
    use pipeline_core::runner::RecordHandler;
    use pipeline_core::testing::{InMemoryBroker, InMemoryStore};

    fn product(id: &str, price: &str, has_stock_control: bool) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price: price.parse().unwrap(),
            description: String::new(),
            is_active: true,
            has_stock_control,
        }
    }

    fn event(items: Vec<OrderItemRequest>) -> InitializeOrderEvent {
        InitializeOrderEvent {
            order_id: "order_1".to_string(),
            customer_data: CustomerData {
                cpf: "12345678900".to_string(),
                email: "jane@example.com".to_string(),
                name: "Jane Doe".to_string(),
            },
            payment_data: Some(PaymentData {
                card_number: "4111111111111111".to_string(),
                card_holder_name: "Jane Doe".to_string(),
                expiry_month: "07".to_string(),
                expiry_year: 2030,
                cvv: "123".to_string(),
            }),
            address_data: Some(AddressData {
                street: "Main St".to_string(),
                number: "1".to_string(),
                neighborhood: "Centro".to_string(),
                city: "Sao Paulo".to_string(),
                state: "SP".to_string(),
                zip_code: "01234-567".to_string(),
                country: "BR".to_string(),
                complement: None,
            }),
            items,
        }
    }

    #[tokio::test]
    async fn happy_path_creates_pending_order_reserves_stock_and_dispatches_payment() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1", "29.99", true));
        store.seed_stock_entry(pipeline_core::models::StockEntry {
            id: "seed".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Increase,
            quantity: 100,
            reason: "seed".to_string(),
            order_id: None,
            created_at: chrono::Utc::now(),
            compensated_at: None,
        });
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker.clone());

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "p1".to_string(),
            quantity: 2,
        }]))
        .unwrap();
        handler.handle(&payload).await.unwrap();

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_items, 2);
        assert_eq!(order.total_value, "59.98".parse().unwrap());
        assert_eq!(broker.queue_len(pipeline_core::messaging::STOCK_QUEUE), 1);
        assert_eq!(broker.queue_len(pipeline_core::messaging::PAYMENT_QUEUE), 1);
    }

    #[tokio::test]
    async fn insufficient_stock_fails_before_any_order_or_stock_message() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1", "10.00", true));
        store.seed_stock_entry(pipeline_core::models::StockEntry {
            id: "seed".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Increase,
            quantity: 2,
            reason: "seed".to_string(),
            order_id: None,
            created_at: chrono::Utc::now(),
            compensated_at: None,
        });
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker.clone());

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "p1".to_string(),
            quantity: 10,
        }]))
        .unwrap();
        let err = handler.handle(&payload).await.unwrap_err();

        assert!(matches!(err, PipelineError::InsufficientStock { .. }));
        assert!(store.get_order("order_1").await.unwrap().is_none());
        assert_eq!(broker.queue_len(pipeline_core::messaging::STOCK_QUEUE), 0);
    }

    #[tokio::test]
    async fn inactive_product_fails_the_order() {
        let store = Arc::new(InMemoryStore::new());
        let mut inactive = product("p1", "10.00", false);
        inactive.is_active = false;
        store.seed_product(inactive);
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker);

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "p1".to_string(),
            quantity: 1,
        }]))
        .unwrap();
        assert!(handler.handle(&payload).await.is_err());
    }

    #[tokio::test]
    async fn missing_product_is_enriched_as_unknown_and_the_order_proceeds() {
        let store = Arc::new(InMemoryStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker);

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "missing".to_string(),
            quantity: 1,
        }]))
        .unwrap();
        handler.handle(&payload).await.unwrap();

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.items[0].product_name, "Unknown Product");
        assert_eq!(order.items[0].total_price, Decimal::ZERO);
        assert!(!order.items[0].has_stock_control);
    }

    #[tokio::test]
    async fn zero_quantity_item_emits_no_stock_message_but_order_still_created() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1", "10.00", true));
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker.clone());

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "p1".to_string(),
            quantity: 0,
        }]))
        .unwrap();
        handler.handle(&payload).await.unwrap();

        let order = store.get_order("order_1").await.unwrap().unwrap();
        assert_eq!(order.items[0].total_price, Decimal::ZERO);
        assert_eq!(broker.queue_len(pipeline_core::messaging::STOCK_QUEUE), 0);
    }

    #[tokio::test]
    async fn duplicate_order_delivery_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1", "10.00", false));
        let broker = Arc::new(InMemoryBroker::new());
        let handler = OrderWorkerHandler::new(store.clone(), broker.clone());

        let payload = serde_json::to_string(&event(vec![OrderItemRequest {
            id: "p1".to_string(),
            quantity: 1,
        }]))
        .unwrap();
        handler.handle(&payload).await.unwrap();
        handler.handle(&payload).await.unwrap();

        assert_eq!(broker.queue_len(pipeline_core::messaging::PAYMENT_QUEUE), 1);
    }
}
