// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain types shared by every worker: the persisted aggregates and
//! the message envelopes that flow between them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Open, denormalized payload shapes
// ============================================================================

/// Customer-identifying fields carried on every order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerData {
    /// Brazilian taxpayer id, normalized to 11 digits.
    pub cpf: String,
    /// Lowercased, trimmed email address.
    pub email: String,
    /// Customer display name.
    pub name: String,
}

/// Card details submitted for a single payment attempt. Never persisted
/// unmasked (see [`crate::masking`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentData {
    /// 16-digit card number, spaces stripped.
    pub card_number: String,
    /// Name on the card.
    pub card_holder_name: String,
    /// Expiry month, zero-padded to 2 digits (`"01"`-`"12"`).
    pub expiry_month: String,
    /// Expiry year (4 digits).
    pub expiry_year: u16,
    /// 3-4 digit card verification value.
    pub cvv: String,
}

/// Shipping/billing address for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressData {
    /// Street name.
    pub street: String,
    /// Street number.
    pub number: String,
    /// Neighborhood/district.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// Two-letter (or similar) state code, uppercased.
    pub state: String,
    /// Normalized `NNNNN-NNN` postal code.
    pub zip_code: String,
    /// Uppercased ISO-style country code or name.
    pub country: String,
    /// Optional address complement (apartment, suite, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

/// A single requested line item before catalog enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    /// Product id.
    pub id: String,
    /// Requested quantity; must be a non-negative integer.
    pub quantity: i64,
}

/// A line item after ORDER-WORKER Phase A enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedOrderItem {
    /// Product id.
    pub id: String,
    /// Requested quantity.
    pub quantity: i64,
    /// Catalog product name at enrichment time.
    pub product_name: String,
    /// Catalog unit price at enrichment time.
    pub unit_price: Decimal,
    /// `unit_price * quantity`.
    pub total_price: Decimal,
    /// Whether the product participates in stock accounting.
    pub has_stock_control: bool,
}

// ============================================================================
// Persisted aggregates
// ============================================================================

/// A deduplicated customer identity, unique per (email, cpf).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    /// Opaque unique id.
    pub id: String,
    /// Normalized 11-digit CPF.
    pub cpf: String,
    /// Lowercased, trimmed email.
    pub email: String,
    /// Customer display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp (the pipeline never updates a Lead; present
    /// for symmetry with Order and for future use).
    pub updated_at: DateTime<Utc>,
}

/// An order's terminal-or-initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Initial state: created by ORDER-WORKER, awaiting payment outcome.
    Pending,
    /// Terminal: payment approved.
    Processed,
    /// Terminal: payment declined, errored, or otherwise rejected.
    Cancelled,
}

impl OrderStatus {
    /// String form used for the `status` column and message envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse a status from its string form. Unrecognized strings fall back
    /// to `Pending` — callers that need strict parsing should validate
    /// against [`Self::as_str`] themselves.
    pub fn parse(s: &str) -> Self {
        match s {
            "PROCESSED" => Self::Processed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Whether transitioning from `self` to `next` is allowed by the state
    /// machine PENDING → {PROCESSED, CANCELLED}, both terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }
}

/// The order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Opaque, time-ordered unique id.
    pub id: String,
    /// The associated Lead.
    pub lead_id: String,
    /// Denormalized customer fields, copied at creation time.
    pub customer_data: CustomerData,
    /// Enriched line items.
    pub items: Vec<EnrichedOrderItem>,
    /// `sum(item.quantity)`.
    pub total_items: i64,
    /// `sum(item.total_price)`, immutable after creation.
    pub total_value: Decimal,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Shipping/billing address, copied at creation time.
    pub address_data: AddressData,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Machine-readable reason for a CANCELLED terminal state.
    pub reason: Option<String>,
    /// The Transaction that produced the current status, if any.
    pub transaction_id: Option<String>,
}

impl Order {
    /// Recompute `total_items`/`total_value` from `items`. Uses
    /// [`Decimal`] arithmetic throughout so totals never drift the way
    /// binary floats would.
    pub fn totals(items: &[EnrichedOrderItem]) -> (i64, Decimal) {
        let total_items = items.iter().map(|i| i.quantity).sum();
        let total_value = items
            .iter()
            .fold(Decimal::ZERO, |acc, i| acc + i.total_price);
        (total_items, total_value)
    }
}

/// Catalog entry. Read-only from the workflow's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Description.
    pub description: String,
    /// Whether the product can be ordered.
    pub is_active: bool,
    /// Whether stock is tracked for this product.
    pub has_stock_control: bool,
}

/// A signed stock ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockOperation {
    /// Adds to current stock.
    Increase,
    /// Subtracts from current stock.
    Decrease,
}

impl StockOperation {
    /// String form used for the `operation` column and message envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increase => "INCREASE",
            Self::Decrease => "DECREASE",
        }
    }

    /// Parse an operation from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INCREASE" => Some(Self::Increase),
            "DECREASE" => Some(Self::Decrease),
            _ => None,
        }
    }

    /// Signed contribution of a quantity under this operation: positive for
    /// INCREASE, negative for DECREASE. Used to fold the ledger into a sum.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            Self::Increase => quantity,
            Self::Decrease => -quantity,
        }
    }
}

/// An append-only stock ledger entry. Never modified or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    /// Unique id.
    pub id: String,
    /// Product this entry concerns.
    pub product_id: String,
    /// Direction of the movement.
    pub operation: StockOperation,
    /// Magnitude, always positive.
    pub quantity: i64,
    /// Free-text reason (e.g. `"Order sale"`, reaper compensation note).
    pub reason: String,
    /// Order that caused this entry, if any.
    pub order_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set by the stock-reaper once an orphaned DECREASE has been
    /// compensated, so it is never compensated twice.
    pub compensated_at: Option<DateTime<Utc>>,
}

/// Payment outcome for a single order attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Created but not yet resolved (never observed at rest in this
    /// pipeline — PAYMENT-WORKER resolves synchronously before insert).
    Pending,
    /// Gateway approved the charge.
    Approved,
    /// Gateway declined the charge.
    Declined,
    /// Gateway or pipeline error while processing.
    Error,
}

impl PaymentStatus {
    /// String form used for the `payment_status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Error => "ERROR",
        }
    }
}

/// The authoritative payment record for one order attempt. Card data is
/// always stored masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Deterministic id derived from the order id (`"txn-" + orderId`),
    /// so broker redelivery is a conflict-as-success rather than a
    /// duplicate row.
    pub id: String,
    /// The order this transaction belongs to.
    pub order_id: String,
    /// Charged amount.
    pub amount: Decimal,
    /// Outcome.
    pub payment_status: PaymentStatus,
    /// Present only when `payment_status == Approved`.
    pub auth_code: Option<String>,
    /// Simulated gateway processing time, in milliseconds.
    pub processing_time_ms: i64,
    /// Card number reduced to `"****-****-****-<last4>"`.
    pub masked_card_number: String,
    /// CVV replaced with a fixed sentinel, never the real value.
    pub masked_cvv: String,
    /// CPF masked to its last 3 digits.
    pub masked_cpf: String,
    /// Address copied from the payment request.
    pub address_data: AddressData,
    /// Customer data copied from the payment request.
    pub customer_data: CustomerData,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The deterministic transaction id for a given order.
    pub fn id_for_order(order_id: &str) -> String {
        format!("txn-{order_id}")
    }
}

// ============================================================================
// Message envelopes
// ============================================================================

/// Published to the INITIALIZE topic by INGRESS; fanned out to the
/// LEAD and ORDER queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeOrderEvent {
    /// Assigned by INGRESS.
    pub order_id: String,
    /// Customer fields.
    pub customer_data: CustomerData,
    /// Payment fields, absent only in malformed/test records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    /// Address fields, absent only in malformed/test records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_data: Option<AddressData>,
    /// Requested line items.
    pub items: Vec<OrderItemRequest>,
}

/// Published to the STOCK queue by ORDER-WORKER (Phase B) or the
/// stock-reaper (compensation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdateMessage {
    /// Product to mutate.
    pub product_id: String,
    /// Quantity to apply, always positive.
    pub quantity: i64,
    /// Direction of the movement.
    pub operation: StockOperation,
    /// Originating order, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Free-text reason.
    pub reason: String,
}

/// Published to the PAYMENT queue by ORDER-WORKER (Phase E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTransactionMessage {
    /// Order to charge.
    pub order_id: String,
    /// Amount to charge, copied from the Order's `total_value`.
    pub order_total_value: Decimal,
    /// Card details.
    pub payment_data: PaymentData,
    /// Billing/shipping address.
    pub address_data: AddressData,
    /// Customer fields.
    pub customer_data: CustomerData,
}

/// Published to the UPDATE-ORDER queue by PAYMENT-WORKER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderMessage {
    /// Order to transition.
    pub order_id: String,
    /// Target status.
    pub status: OrderStatus,
    /// Machine-readable reason, present on CANCELLED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The Transaction that produced this update, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_transition_table() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn order_status_round_trips_through_strings() {
        for s in [OrderStatus::Pending, OrderStatus::Processed, OrderStatus::Cancelled] {
            assert_eq!(OrderStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn stock_operation_signed_contribution() {
        assert_eq!(StockOperation::Increase.signed(5), 5);
        assert_eq!(StockOperation::Decrease.signed(5), -5);
    }

    #[test]
    fn order_totals_are_computed_with_decimal_arithmetic() {
        let items = vec![
            EnrichedOrderItem {
                id: "p1".to_string(),
                quantity: 2,
                product_name: "Widget".to_string(),
                unit_price: Decimal::new(2999, 2),
                total_price: Decimal::new(5998, 2),
                has_stock_control: true,
            },
            EnrichedOrderItem {
                id: "p2".to_string(),
                quantity: 1,
                product_name: "Gadget".to_string(),
                unit_price: Decimal::new(1000, 2),
                total_price: Decimal::new(1000, 2),
                has_stock_control: false,
            },
        ];
        let (total_items, total_value) = Order::totals(&items);
        assert_eq!(total_items, 3);
        assert_eq!(total_value, Decimal::new(6998, 2));
    }

    #[test]
    fn deterministic_transaction_id_is_stable_across_redelivery() {
        let a = Transaction::id_for_order("order-123");
        let b = Transaction::id_for_order("order-123");
        assert_eq!(a, b);
        assert_eq!(a, "txn-order-123");
    }
}
