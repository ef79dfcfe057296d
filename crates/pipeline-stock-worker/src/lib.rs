// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! STOCK-WORKER: consumes stock-mutation requests and appends signed
//! entries to the append-only stock ledger. The append is the commit
//! point; entries are never updated in place here (the stock-reaper's
//! `compensated_at` stamp is the one sanctioned exception).

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_core::error::PipelineError;
use pipeline_core::ids::generate_stock_entry_id;
use pipeline_core::models::{StockEntry, StockOperation, StockUpdateMessage};
use pipeline_core::runner::RecordHandler;
use pipeline_core::store::Store;
use tracing::info;

/// STOCK-WORKER's [`RecordHandler`].
pub struct StockWorkerHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StockWorkerHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> RecordHandler for StockWorkerHandler<S> {
    async fn handle(&self, payload: &str) -> Result<(), PipelineError> {
        let message: StockUpdateMessage = serde_json::from_str(payload)?;

        if message.quantity <= 0 {
            return Err(PipelineError::validation("quantity", "quantity must be positive"));
        }

        let product = self
            .store
            .get_product(&message.product_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("Product", &message.product_id))?;

        if !product.is_active {
            return Err(PipelineError::validation(
                "productId",
                format!("product '{}' is not active", product.id),
            ));
        }

        // Advisory re-check: ORDER-WORKER already verified availability at
        // enrichment time, but messages may arrive interleaved with
        // unrelated operations, so the ledger is re-summed here too.
        if message.operation == StockOperation::Decrease {
            let available = self.store.current_stock(&message.product_id).await?;
            if available < message.quantity {
                return Err(PipelineError::InsufficientStock {
                    product_id: message.product_id.clone(),
                    available,
                    requested: message.quantity,
                });
            }
        }

        let entry = StockEntry {
            id: generate_stock_entry_id(),
            product_id: message.product_id.clone(),
            operation: message.operation,
            quantity: message.quantity,
            reason: message.reason.clone(),
            order_id: message.order_id.clone(),
            created_at: chrono::Utc::now(),
            compensated_at: None,
        };

        self.store.insert_stock_entry(&entry).await?;
        info!(
            entry_id = %entry.id,
            product_id = %entry.product_id,
            operation = entry.operation.as_str(),
            quantity = entry.quantity,
            "stock entry appended"
        );

        Ok(())
    }
}
