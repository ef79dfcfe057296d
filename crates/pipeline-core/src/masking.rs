// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sensitive-field masking for persisted [`crate::models::Transaction`]
//! records and for error messages.
//!
//! No unmasked card number, CVV, or full CPF is ever persisted.

/// Fixed sentinel stored in place of a real CVV. The real value is never
/// retained past the simulated gateway call.
pub const MASKED_CVV_SENTINEL: &str = "***";

/// Reduce a card number to `"****-****-****-<last4>"`.
pub fn mask_card_number(card_number: &str) -> String {
    let digits: String = card_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let last_four = if digits.len() >= 4 {
        &digits[digits.len() - 4..]
    } else {
        digits.as_str()
    };
    format!("****-****-****-{last_four}")
}

/// Replace a CVV with the fixed sentinel, regardless of its real value.
pub fn mask_cvv(_cvv: &str) -> String {
    MASKED_CVV_SENTINEL.to_string()
}

/// Reduce a normalized 11-digit CPF to its last 3 digits, e.g.
/// `"12345678900"` -> `"***.***.***-00"`... simplified to the last 3 digits
/// prefixed with asterisks, matching the "CPF masked" requirement without
/// prescribing a specific display format.
pub fn mask_cpf(cpf: &str) -> String {
    if cpf.len() <= 3 {
        return "*".repeat(cpf.len());
    }
    let (head, tail) = cpf.split_at(cpf.len() - 3);
    format!("{}{}", "*".repeat(head.len()), tail)
}
