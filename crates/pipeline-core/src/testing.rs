// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory fakes for [`crate::store::Store`] and
//! [`crate::messaging::MessageBroker`], used by every worker crate's test
//! suite instead of spinning up Postgres/Redis for pure workflow-logic
//! tests. `testcontainers` stays as a dev-dependency for the store's own
//! conditional-insert tests (see `tests/postgres_store.rs`), but worker
//! tests default to these fakes, which run in milliseconds and need no
//! external services.

#![cfg(any(test, feature = "test-support"))]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::messaging::{Delivery, MessageBroker};
use crate::models::{Lead, Order, OrderStatus, Product, StockEntry, Transaction};
use crate::store::{InsertOutcome, Store};

/// An in-memory [`Store`] backed by `Mutex<HashMap<..>>`, sufficient for
/// single-threaded or lightly concurrent tests.
#[derive(Default)]
pub struct InMemoryStore {
    leads: Mutex<HashMap<String, Lead>>,
    products: Mutex<HashMap<String, Product>>,
    stock_entries: Mutex<Vec<StockEntry>>,
    orders: Mutex<HashMap<String, Order>>,
    transactions: Mutex<HashMap<String, Transaction>>,
}

impl InMemoryStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product into the catalog, for test setup.
    pub fn seed_product(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id.clone(), product);
    }

    /// Directly append a stock entry, for test setup (bypassing the normal
    /// append API so tests can seed a starting balance without going
    /// through [`Store::insert_stock_entry`]'s dedup).
    pub fn seed_stock_entry(&self, entry: StockEntry) {
        self.stock_entries.lock().unwrap().push(entry);
    }

    /// Snapshot all stock entries, for assertions.
    pub fn all_stock_entries(&self) -> Vec<StockEntry> {
        self.stock_entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_lead(&self, email: &str, cpf: &str) -> Result<Option<Lead>, PipelineError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .values()
            .find(|l| l.email == email && l.cpf == cpf)
            .cloned())
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<InsertOutcome, PipelineError> {
        let mut leads = self.leads.lock().unwrap();
        if leads.contains_key(&lead.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        leads.insert(lead.id.clone(), lead.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, PipelineError> {
        Ok(self.products.lock().unwrap().get(product_id).cloned())
    }

    async fn current_stock(&self, product_id: &str) -> Result<i64, PipelineError> {
        Ok(self
            .stock_entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.product_id == product_id)
            .map(|e| e.operation.signed(e.quantity))
            .sum())
    }

    async fn insert_stock_entry(&self, entry: &StockEntry) -> Result<InsertOutcome, PipelineError> {
        let mut entries = self.stock_entries.lock().unwrap();
        if entries.iter().any(|e| e.id == entry.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        entries.push(entry.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_orphaned_decreases(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StockEntry>, PipelineError> {
        let entries = self.stock_entries.lock().unwrap();
        let orders = self.orders.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| {
                e.operation == crate::models::StockOperation::Decrease
                    && e.order_id.is_some()
                    && e.compensated_at.is_none()
                    && e.created_at < cutoff
                    && !orders.contains_key(e.order_id.as_deref().unwrap_or_default())
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_stock_entry_compensated(&self, entry_id: &str) -> Result<(), PipelineError> {
        let mut entries = self.stock_entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.compensated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, PipelineError> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, PipelineError> {
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), PipelineError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PipelineError::not_found("Order", order_id))?;
        order.status = status;
        order.updated_at = Utc::now();
        if let Some(reason) = reason {
            order.reason = Some(reason.to_string());
        }
        if let Some(transaction_id) = transaction_id {
            order.transaction_id = Some(transaction_id.to_string());
        }
        Ok(())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, PipelineError> {
        Ok(self.transactions.lock().unwrap().get(id).cloned())
    }

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<InsertOutcome, PipelineError> {
        let mut transactions = self.transactions.lock().unwrap();
        if transactions.contains_key(&transaction.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(true)
    }
}

/// An in-memory [`MessageBroker`] backed by `Mutex<HashMap<String,
/// VecDeque<String>>>` per named queue, with an in-flight list per queue
/// for ack/nack bookkeeping.
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    in_flight: Mutex<HashMap<String, Vec<String>>>,
}

impl InMemoryBroker {
    /// Build an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently queued (not yet delivered) for `queue`.
    pub fn queue_len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish_topic(
        &self,
        _topic: &str,
        subscribers: &[&str],
        payload: &str,
    ) -> Result<(), PipelineError> {
        let mut queues = self.queues.lock().unwrap();
        for queue in subscribers {
            queues
                .entry(queue.to_string())
                .or_default()
                .push_back(payload.to_string());
        }
        Ok(())
    }

    async fn publish_queue(&self, queue: &str, payload: &str) -> Result<(), PipelineError> {
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<Delivery>, PipelineError> {
        let mut queues = self.queues.lock().unwrap();
        let mut in_flight = self.in_flight.lock().unwrap();
        let pending = queues.entry(queue.to_string()).or_default();
        let flight = in_flight.entry(queue.to_string()).or_default();

        let mut deliveries = Vec::new();
        for _ in 0..max {
            match pending.pop_front() {
                Some(payload) => {
                    flight.push(payload.clone());
                    deliveries.push(Delivery {
                        handle: payload.clone(),
                        payload,
                    });
                }
                None => break,
            }
        }
        Ok(deliveries)
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(flight) = in_flight.get_mut(queue) {
            if let Some(pos) = flight.iter().position(|p| p == &delivery.handle) {
                flight.remove(pos);
            }
        }
        Ok(())
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), PipelineError> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(flight) = in_flight.get_mut(queue) {
            if let Some(pos) = flight.iter().position(|p| p == &delivery.handle) {
                flight.remove(pos);
            }
        }
        drop(in_flight);
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_front(delivery.payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_broker_fans_out_topic_to_subscribers() {
        let broker = InMemoryBroker::new();
        broker
            .publish_topic("initialize-order", &["lead-worker", "order-worker"], "{}")
            .await
            .unwrap();

        assert_eq!(broker.queue_len("lead-worker"), 1);
        assert_eq!(broker.queue_len("order-worker"), 1);
    }

    #[tokio::test]
    async fn in_memory_broker_nack_requeues_for_redelivery() {
        let broker = InMemoryBroker::new();
        broker.publish_queue("q", "payload-a").await.unwrap();

        let deliveries = broker.receive_batch("q", 1).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(broker.queue_len("q"), 0);

        broker.nack("q", &deliveries[0]).await.unwrap();
        assert_eq!(broker.queue_len("q"), 1);
    }

    #[tokio::test]
    async fn in_memory_broker_ack_does_not_requeue() {
        let broker = InMemoryBroker::new();
        broker.publish_queue("q", "payload-a").await.unwrap();
        let deliveries = broker.receive_batch("q", 1).await.unwrap();
        broker.ack("q", &deliveries[0]).await.unwrap();
        assert_eq!(broker.queue_len("q"), 0);
    }

    #[tokio::test]
    async fn in_memory_store_insert_order_is_idempotent() {
        use crate::models::{AddressData, CustomerData, OrderStatus};
        let store = InMemoryStore::new();
        let order = Order {
            id: "order-1".to_string(),
            lead_id: "lead-1".to_string(),
            customer_data: CustomerData {
                cpf: "12345678900".to_string(),
                email: "a@b.com".to_string(),
                name: "A".to_string(),
            },
            items: vec![],
            total_items: 0,
            total_value: Default::default(),
            status: OrderStatus::Pending,
            address_data: AddressData {
                street: "S".to_string(),
                number: "1".to_string(),
                neighborhood: "N".to_string(),
                city: "C".to_string(),
                state: "ST".to_string(),
                zip_code: "00000-000".to_string(),
                country: "BR".to_string(),
                complement: None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
            reason: None,
            transaction_id: None,
        };

        assert_eq!(store.insert_order(&order).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert_order(&order).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
    }
}
