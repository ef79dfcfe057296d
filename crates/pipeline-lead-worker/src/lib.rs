// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! LEAD-WORKER: consumes INITIALIZE and deduplicates customers into
//! `Lead` records.
//!
//! Runs independently of ORDER-WORKER and may race it for the same
//! (email, cpf) pair; both perform the same find-or-create and rely on
//! the conditional insert to keep at most one row per id.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_core::error::PipelineError;
use pipeline_core::lead_dedup::find_or_create_lead;
use pipeline_core::models::InitializeOrderEvent;
use pipeline_core::runner::RecordHandler;
use pipeline_core::store::Store;

/// LEAD-WORKER's [`RecordHandler`].
pub struct LeadWorkerHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> LeadWorkerHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> RecordHandler for LeadWorkerHandler<S> {
    async fn handle(&self, payload: &str) -> Result<(), PipelineError> {
        let event: InitializeOrderEvent = serde_json::from_str(payload)?;

        find_or_create_lead(
            self.store.as_ref(),
            &event.customer_data.cpf,
            &event.customer_data.email,
            &event.customer_data.name,
        )
        .await?;

        Ok(())
    }
}
