// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed `Store` integration tests.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a live Postgres instance.
//! Run with:
//! ```bash
//! TEST_DATABASE_URL=postgres://... cargo test -p pipeline-core --test postgres_store
//! ```

use chrono::Utc;
use pipeline_core::ids::{generate_lead_id, generate_order_id};
use pipeline_core::models::{AddressData, CustomerData, Lead, Order, OrderStatus};
use pipeline_core::store::{InsertOutcome, PostgresStore, Store};
use sqlx::PgPool;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

async fn connect() -> Option<PostgresStore> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    MIGRATOR.run(&pool).await.ok()?;
    Some(PostgresStore::new(pool))
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

#[tokio::test]
async fn insert_lead_is_idempotent_on_conflicting_id() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: TEST_DATABASE_URL not set");
        return;
    };

    let now = Utc::now();
    let lead = Lead {
        id: generate_lead_id(),
        cpf: "12345678900".to_string(),
        email: "jane@example.com".to_string(),
        name: "Jane Doe".to_string(),
        created_at: now,
        updated_at: now,
    };

    assert_eq!(store.insert_lead(&lead).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(store.insert_lead(&lead).await.unwrap(), InsertOutcome::AlreadyExists);

    let found = store.find_lead(&lead.email, &lead.cpf).await.unwrap().unwrap();
    assert_eq!(found.id, lead.id);
}

#[tokio::test]
async fn insert_order_is_idempotent_and_update_order_status_persists() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: TEST_DATABASE_URL not set");
        return;
    };

    let now = Utc::now();
    let order = Order {
        id: generate_order_id(),
        lead_id: generate_lead_id(),
        customer_data: CustomerData {
            cpf: "12345678900".to_string(),
            email: "jane@example.com".to_string(),
            name: "Jane Doe".to_string(),
        },
        items: vec![],
        total_items: 0,
        total_value: "0".parse().unwrap(),
        status: OrderStatus::Pending,
        address_data: address(),
        created_at: now,
        updated_at: now,
        reason: None,
        transaction_id: None,
    };

    assert_eq!(store.insert_order(&order).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(store.insert_order(&order).await.unwrap(), InsertOutcome::AlreadyExists);

    store
        .update_order_status(&order.id, OrderStatus::Processed, None, Some("txn-1"))
        .await
        .unwrap();

    let reloaded = store.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatus::Processed);
    assert_eq!(reloaded.transaction_id.as_deref(), Some("txn-1"));
}

#[tokio::test]
async fn current_stock_sums_the_ledger() {
    let Some(store) = connect().await else {
        eprintln!("Skipping test: TEST_DATABASE_URL not set");
        return;
    };

    use pipeline_core::ids::generate_stock_entry_id;
    use pipeline_core::models::{Product, StockEntry, StockOperation};

    let product = Product {
        id: format!("p-{}", generate_order_id()),
        name: "Widget".to_string(),
        price: "10.00".parse().unwrap(),
        description: String::new(),
        is_active: true,
        has_stock_control: true,
    };
    sqlx::query(
        "INSERT INTO products (id, name, price, description, is_active, has_stock_control) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.description)
    .bind(product.is_active)
    .bind(product.has_stock_control)
    .execute(store.pool())
    .await
    .unwrap();

    let increase = StockEntry {
        id: generate_stock_entry_id(),
        product_id: product.id.clone(),
        operation: StockOperation::Increase,
        quantity: 100,
        reason: "Initial stock".to_string(),
        order_id: None,
        created_at: Utc::now(),
        compensated_at: None,
    };
    let decrease = StockEntry {
        id: generate_stock_entry_id(),
        product_id: product.id.clone(),
        operation: StockOperation::Decrease,
        quantity: 30,
        reason: "Order sale".to_string(),
        order_id: None,
        created_at: Utc::now(),
        compensated_at: None,
    };

    store.insert_stock_entry(&increase).await.unwrap();
    store.insert_stock_entry(&decrease).await.unwrap();

    assert_eq!(store.current_stock(&product.id).await.unwrap(), 70);
}
