// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared find-or-create Lead deduplication.
//!
//! LEAD-WORKER and ORDER-WORKER both perform this exact lookup
//! independently of each other and may race for the same (email, cpf)
//! pair; both rely on the store's conditional insert to keep at most one
//! row per id, accepting a narrow window where two rows can carry the
//! same (email, cpf). Living here (rather than duplicated in each worker
//! crate) keeps that shared contract from drifting between the two
//! call sites.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::ids::generate_lead_id;
use crate::models::Lead;
use crate::normalize::{normalize_cpf, normalize_email};
use crate::store::{InsertOutcome, Store};

/// Find a Lead by (email, cpf), re-normalizing both independently of
/// whatever the caller already did, and create one if none exists.
pub async fn find_or_create_lead(
    store: &(impl Store + ?Sized),
    cpf: &str,
    email: &str,
    name: &str,
) -> Result<Lead, PipelineError> {
    let cpf = normalize_cpf(cpf)?;
    let email = normalize_email(email)?;

    if let Some(existing) = store.find_lead(&email, &cpf).await? {
        debug!(lead_id = %existing.id, "lead already exists");
        return Ok(existing);
    }

    let lead = Lead {
        id: generate_lead_id(),
        cpf,
        email,
        name: name.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match store.insert_lead(&lead).await? {
        InsertOutcome::Inserted => info!(lead_id = %lead.id, "lead created"),
        InsertOutcome::AlreadyExists => {
            debug!(lead_id = %lead.id, "lead insert raced with a concurrent creator");
        }
    }

    Ok(lead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;

    #[tokio::test]
    async fn first_arrival_creates_a_lead() {
        let store = InMemoryStore::new();
        let lead = find_or_create_lead(&store, "123.456.789-00", "Jane@Example.com", "Jane Doe")
            .await
            .unwrap();
        assert_eq!(lead.cpf, "12345678900");
        assert_eq!(lead.email, "jane@example.com");
    }

    #[tokio::test]
    async fn second_arrival_for_the_same_pair_converges_on_one_lead() {
        let store = InMemoryStore::new();
        let first = find_or_create_lead(&store, "12345678900", "jane@example.com", "Jane Doe")
            .await
            .unwrap();
        let second = find_or_create_lead(&store, "12345678900", "jane@example.com", "Jane Doe")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn malformed_cpf_is_rejected() {
        let store = InMemoryStore::new();
        assert!(
            find_or_create_lead(&store, "123", "jane@example.com", "Jane Doe")
                .await
                .is_err()
        );
    }
}
