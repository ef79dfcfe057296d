// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed implementation of [`super::Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{InsertOutcome, Store};
use crate::error::PipelineError;
use crate::models::{
    AddressData, CustomerData, EnrichedOrderItem, Lead, Order, OrderStatus, PaymentStatus,
    Product, StockEntry, StockOperation, Transaction,
};

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers (migrations, health checks) that
    /// need direct access.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<Order, PipelineError> {
    let customer_data: CustomerData = serde_json::from_value(row.try_get("customer_data")?)?;
    let items: Vec<EnrichedOrderItem> = serde_json::from_value(row.try_get("items")?)?;
    let address_data: AddressData = serde_json::from_value(row.try_get("address_data")?)?;
    let status_str: String = row.try_get("status")?;

    Ok(Order {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        customer_data,
        items,
        total_items: row.try_get("total_items")?,
        total_value: row.try_get("total_value")?,
        status: OrderStatus::parse(&status_str),
        address_data,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        reason: row.try_get("reason")?,
        transaction_id: row.try_get("transaction_id")?,
    })
}

fn row_to_transaction(row: &sqlx::postgres::PgRow) -> Result<Transaction, PipelineError> {
    let address_data: AddressData = serde_json::from_value(row.try_get("address_data")?)?;
    let customer_data: CustomerData = serde_json::from_value(row.try_get("customer_data")?)?;
    let status_str: String = row.try_get("payment_status")?;
    let payment_status = match status_str.as_str() {
        "APPROVED" => PaymentStatus::Approved,
        "DECLINED" => PaymentStatus::Declined,
        "ERROR" => PaymentStatus::Error,
        _ => PaymentStatus::Pending,
    };

    Ok(Transaction {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        amount: row.try_get("amount")?,
        payment_status,
        auth_code: row.try_get("auth_code")?,
        processing_time_ms: row.try_get("processing_time_ms")?,
        masked_card_number: row.try_get("masked_card_number")?,
        masked_cvv: row.try_get("masked_cvv")?,
        masked_cpf: row.try_get("masked_cpf")?,
        address_data,
        customer_data,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_stock_entry(row: &sqlx::postgres::PgRow) -> Result<StockEntry, PipelineError> {
    let operation_str: String = row.try_get("operation")?;
    let operation = StockOperation::parse(&operation_str).ok_or_else(|| PipelineError::Fatal {
        details: format!("unrecognized stock operation '{operation_str}'"),
    })?;

    Ok(StockEntry {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        operation,
        quantity: row.try_get("quantity")?,
        reason: row.try_get("reason")?,
        order_id: row.try_get("order_id")?,
        created_at: row.try_get("created_at")?,
        compensated_at: row.try_get("compensated_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn find_lead(&self, email: &str, cpf: &str) -> Result<Option<Lead>, PipelineError> {
        let candidates = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, cpf, email, name, created_at, updated_at
            FROM leads
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates.into_iter().find(|lead| lead.cpf == cpf))
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<InsertOutcome, PipelineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leads (id, cpf, email, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.cpf)
        .bind(&lead.email)
        .bind(&lead.name)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, PipelineError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, description, is_active, has_stock_control
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn current_stock(&self, product_id: &str) -> Result<i64, PipelineError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN operation = 'INCREASE' THEN quantity ELSE 0 END), 0)
                - COALESCE(SUM(CASE WHEN operation = 'DECREASE' THEN quantity ELSE 0 END), 0)
                AS balance
            FROM stock_entries
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("balance")?)
    }

    async fn insert_stock_entry(&self, entry: &StockEntry) -> Result<InsertOutcome, PipelineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stock_entries
                (id, product_id, operation, quantity, reason, order_id, created_at, compensated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.operation.as_str())
        .bind(entry.quantity)
        .bind(&entry.reason)
        .bind(&entry.order_id)
        .bind(entry.created_at)
        .bind(entry.compensated_at)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn list_orphaned_decreases(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StockEntry>, PipelineError> {
        let rows = sqlx::query(
            r#"
            SELECT se.id, se.product_id, se.operation, se.quantity, se.reason,
                   se.order_id, se.created_at, se.compensated_at
            FROM stock_entries se
            LEFT JOIN orders o ON o.id = se.order_id
            WHERE se.operation = 'DECREASE'
              AND se.order_id IS NOT NULL
              AND se.compensated_at IS NULL
              AND se.created_at < $1
              AND o.id IS NULL
            ORDER BY se.created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stock_entry).collect()
    }

    async fn mark_stock_entry_compensated(&self, entry_id: &str) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            UPDATE stock_entries
            SET compensated_at = NOW()
            WHERE id = $1 AND compensated_at IS NULL
            "#,
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, PipelineError> {
        let row = sqlx::query(
            r#"
            SELECT id, lead_id, customer_data, items, total_items, total_value,
                   status, address_data, created_at, updated_at, reason, transaction_id
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<InsertOutcome, PipelineError> {
        let customer_data = serde_json::to_value(&order.customer_data)?;
        let items = serde_json::to_value(&order.items)?;
        let address_data = serde_json::to_value(&order.address_data)?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders
                (id, lead_id, customer_data, items, total_items, total_value,
                 status, address_data, created_at, updated_at, reason, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&order.id)
        .bind(&order.lead_id)
        .bind(customer_data)
        .bind(items)
        .bind(order.total_items)
        .bind(order.total_value)
        .bind(order.status.as_str())
        .bind(address_data)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.reason)
        .bind(&order.transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), PipelineError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, reason = COALESCE($3, reason),
                transaction_id = COALESCE($4, transaction_id), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(reason)
        .bind(transaction_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::not_found("Order", order_id));
        }

        Ok(())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, PipelineError> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount, payment_status, auth_code, processing_time_ms,
                   masked_card_number, masked_cvv, masked_cpf, address_data, customer_data,
                   created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<InsertOutcome, PipelineError> {
        let address_data = serde_json::to_value(&transaction.address_data)?;
        let customer_data = serde_json::to_value(&transaction.customer_data)?;

        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, order_id, amount, payment_status, auth_code, processing_time_ms,
                 masked_card_number, masked_cvv, masked_cpf, address_data, customer_data,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.order_id)
        .bind(transaction.amount)
        .bind(transaction.payment_status.as_str())
        .bind(&transaction.auth_code)
        .bind(transaction.processing_time_ms)
        .bind(&transaction.masked_card_number)
        .bind(&transaction.masked_cvv)
        .bind(&transaction.masked_cpf)
        .bind(address_data)
        .bind(customer_data)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn health_check(&self) -> Result<bool, PipelineError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
