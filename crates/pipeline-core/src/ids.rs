// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Id generation.
//!
//! Order ids use UUIDv7 so they carry a time-ordered opaque prefix, giving
//! callers monotonic-ish ids for crude chronological sorting without
//! exposing a sequence. Every other entity id is a plain UUIDv4.

use uuid::Uuid;

/// Generate a time-ordered opaque order id, e.g. `"order_01933f..."`.
pub fn generate_order_id() -> String {
    format!("order_{}", Uuid::now_v7().simple())
}

/// Generate an opaque Lead id.
pub fn generate_lead_id() -> String {
    format!("lead_{}", Uuid::new_v4().simple())
}

/// Generate an opaque StockEntry id.
pub fn generate_stock_entry_id() -> String {
    format!("stock_{}", Uuid::new_v4().simple())
}
