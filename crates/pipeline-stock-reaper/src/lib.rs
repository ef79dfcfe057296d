// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! STOCK-REAPER: periodically compensates DECREASE stock-ledger entries
//! whose Order never completed (crashed worker, dropped message). Each
//! orphan gets a matching INCREASE entry and is stamped `compensated_at`
//! so it is never repaired twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipeline_core::error::PipelineError;
use pipeline_core::ids::generate_stock_entry_id;
use pipeline_core::models::{StockEntry, StockOperation};
use pipeline_core::store::Store;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Batch size for one reaper scan.
const BATCH_SIZE: i64 = 50;

/// Runs the reaper's poll loop until signaled to shut down.
pub struct Reaper<S: Store> {
    store: Arc<S>,
    grace_period: Duration,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
}

impl<S: Store> Reaper<S> {
    pub fn new(store: Arc<S>, grace_period: Duration, poll_interval: Duration) -> Self {
        Self {
            store,
            grace_period,
            poll_interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Runs ticks on `poll_interval` until `shutdown_handle()` is notified.
    pub async fn run(self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            grace_period_secs = self.grace_period.as_secs(),
            "stock-reaper started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("stock-reaper shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(err) = run_tick(self.store.as_ref(), self.grace_period).await {
                        error!(error = %err, "reaper tick failed to query orphans");
                    }
                }
            }
        }
    }
}

/// One scan-and-compensate pass. Errors compensating a single entry are
/// logged and do not stop the tick (same per-record isolation policy as
/// every other worker).
pub async fn run_tick(store: &(impl Store + ?Sized), grace_period: Duration) -> Result<(), PipelineError> {
    let cutoff = Utc::now() - chrono::Duration::from_std(grace_period).expect("grace period fits in chrono::Duration");

    let orphans = store.list_orphaned_decreases(cutoff, BATCH_SIZE).await?;
    if orphans.is_empty() {
        return Ok(());
    }

    info!(count = orphans.len(), "compensating orphaned stock decreases");

    for orphan in orphans {
        if let Err(err) = compensate(store, &orphan).await {
            warn!(entry_id = %orphan.id, error = %err, "failed to compensate orphaned stock entry");
        }
    }

    Ok(())
}

async fn compensate(store: &(impl Store + ?Sized), orphan: &StockEntry) -> Result<(), PipelineError> {
    let compensation = StockEntry {
        id: generate_stock_entry_id(),
        product_id: orphan.product_id.clone(),
        operation: StockOperation::Increase,
        quantity: orphan.quantity,
        reason: format!("Reaper compensation for orphaned decrease {}", orphan.id),
        order_id: orphan.order_id.clone(),
        created_at: Utc::now(),
        compensated_at: None,
    };

    store.insert_stock_entry(&compensation).await?;
    store.mark_stock_entry_compensated(&orphan.id).await?;

    info!(
        orphan_id = %orphan.id,
        compensation_id = %compensation.id,
        product_id = %orphan.product_id,
        quantity = orphan.quantity,
        "orphaned stock decrease compensated"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::models::{AddressData, CustomerData, Order, OrderStatus, Product};
    use pipeline_core::testing::InMemoryStore;

    fn existing_order(id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            lead_id: "lead_1".to_string(),
            customer_data: CustomerData {
                cpf: "12345678900".to_string(),
                email: "jane@example.com".to_string(),
                name: "Jane Doe".to_string(),
            },
            items: vec![],
            total_items: 1,
            total_value: "59.98".parse().unwrap(),
            status: OrderStatus::Pending,
            address_data: AddressData {
                street: "Main St".to_string(),
                number: "1".to_string(),
                neighborhood: "Centro".to_string(),
                city: "Sao Paulo".to_string(),
                state: "SP".to_string(),
                zip_code: "01234-567".to_string(),
                country: "BR".to_string(),
                complement: None,
            },
            created_at: now,
            updated_at: now,
            reason: None,
            transaction_id: None,
        }
    }

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            name: "Widget".to_string(),
            price: "10.00".parse().unwrap(),
            description: String::new(),
            is_active: true,
            has_stock_control: true,
        }
    }

    #[tokio::test]
    async fn orphaned_decrease_is_compensated_and_stamped() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1"));

        let old_entry = StockEntry {
            id: "se_1".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Decrease,
            quantity: 5,
            reason: "Order sale".to_string(),
            order_id: Some("order_that_never_completed".to_string()),
            created_at: Utc::now() - chrono::Duration::minutes(10),
            compensated_at: None,
        };
        store.insert_stock_entry(&old_entry).await.unwrap();

        run_tick(store.as_ref(), Duration::from_secs(300)).await.unwrap();

        let entries = store.all_stock_entries();
        assert_eq!(entries.len(), 2);
        let compensation = entries.iter().find(|e| e.id != "se_1").unwrap();
        assert_eq!(compensation.operation, StockOperation::Increase);
        assert_eq!(compensation.quantity, 5);
        assert!(compensation.reason.contains("se_1"));

        let stamped = entries.iter().find(|e| e.id == "se_1").unwrap();
        assert!(stamped.compensated_at.is_some());

        assert_eq!(store.current_stock("p1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn decrease_with_a_real_order_is_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1"));

        let entry = StockEntry {
            id: "se_1".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Decrease,
            quantity: 5,
            reason: "Order sale".to_string(),
            order_id: Some("order_1".to_string()),
            created_at: Utc::now() - chrono::Duration::minutes(10),
            compensated_at: None,
        };
        store.insert_stock_entry(&entry).await.unwrap();
        store.insert_order(&existing_order("order_1")).await.unwrap();

        run_tick(store.as_ref(), Duration::from_secs(300)).await.unwrap();

        assert_eq!(store.all_stock_entries().len(), 1);
    }

    #[tokio::test]
    async fn decrease_younger_than_the_grace_period_is_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1"));

        let entry = StockEntry {
            id: "se_1".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Decrease,
            quantity: 5,
            reason: "Order sale".to_string(),
            order_id: Some("order_that_never_completed".to_string()),
            created_at: Utc::now(),
            compensated_at: None,
        };
        store.insert_stock_entry(&entry).await.unwrap();

        run_tick(store.as_ref(), Duration::from_secs(300)).await.unwrap();

        assert_eq!(store.all_stock_entries().len(), 1);
    }

    #[tokio::test]
    async fn already_compensated_entries_are_not_repaired_twice() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_product(product("p1"));

        let entry = StockEntry {
            id: "se_1".to_string(),
            product_id: "p1".to_string(),
            operation: StockOperation::Decrease,
            quantity: 5,
            reason: "Order sale".to_string(),
            order_id: Some("order_that_never_completed".to_string()),
            created_at: Utc::now() - chrono::Duration::minutes(10),
            compensated_at: Some(Utc::now()),
        };
        store.insert_stock_entry(&entry).await.unwrap();

        run_tick(store.as_ref(), Duration::from_secs(300)).await.unwrap();

        assert_eq!(store.all_stock_entries().len(), 1);
    }
}
