// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document store abstraction.
//!
//! All mutual exclusion is delegated to the store's conditional writes
//! (`ON CONFLICT (id) DO NOTHING` — the Postgres equivalent of
//! `attribute_not_exists(id)`) rather than in-process locks. Reads are
//! unlocked snapshots; the DECREASE stock check and the reaper's orphan
//! scan re-read from the ledger where staleness would otherwise matter.

pub mod postgres;

pub use postgres::PostgresStore;

use crate::error::PipelineError;
use crate::models::{Lead, Order, OrderStatus, Product, StockEntry, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of a conditional ("idempotent create") insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was created.
    Inserted,
    /// A row with this id already existed; treated as success by every
    /// idempotent-create caller.
    AlreadyExists,
}

/// The document store interface used by every worker and the ingress
/// service.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Lead --------------------------------------------------------------

    /// Find a Lead by (email, cpf). Looks up by the `email` secondary index
    /// then filters in-process for a matching `cpf`.
    async fn find_lead(&self, email: &str, cpf: &str) -> Result<Option<Lead>, PipelineError>;

    /// Insert a Lead, succeeding idempotently if its id already exists.
    async fn insert_lead(&self, lead: &Lead) -> Result<InsertOutcome, PipelineError>;

    // -- Product / stock -----------------------------------------------------

    /// Look up a catalog product by id.
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, PipelineError>;

    /// Sum `INCREASE.quantity - DECREASE.quantity` over all ledger entries
    /// for a product.
    async fn current_stock(&self, product_id: &str) -> Result<i64, PipelineError>;

    /// Append a new ledger entry. The append is the commit point; entries
    /// are never updated except via [`Store::mark_stock_entry_compensated`].
    async fn insert_stock_entry(&self, entry: &StockEntry) -> Result<InsertOutcome, PipelineError>;

    /// List DECREASE entries with an `order_id` but no matching Order row,
    /// created before `cutoff`, not yet compensated. Used by the
    /// stock-reaper.
    async fn list_orphaned_decreases(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StockEntry>, PipelineError>;

    /// Stamp a ledger entry as compensated so the reaper never repairs it
    /// twice.
    async fn mark_stock_entry_compensated(&self, entry_id: &str) -> Result<(), PipelineError>;

    // -- Order ---------------------------------------------------------------

    /// Look up an order by id.
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, PipelineError>;

    /// Insert a new PENDING order, succeeding idempotently if its id
    /// already exists.
    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, PipelineError>;

    /// Apply a validated status transition. Fails with
    /// [`PipelineError::NotFound`] if the order does not exist.
    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), PipelineError>;

    // -- Transaction -----------------------------------------------------------

    /// Look up a transaction by id.
    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, PipelineError>;

    /// Insert a transaction, succeeding idempotently if its id already
    /// exists (relies on the deterministic `"txn-" + orderId` id).
    async fn insert_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<InsertOutcome, PipelineError>;

    /// Lightweight connectivity check for readiness probes.
    async fn health_check(&self) -> Result<bool, PipelineError>;
}
