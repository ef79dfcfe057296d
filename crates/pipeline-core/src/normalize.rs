// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Field normalization shared by INGRESS, LEAD-WORKER, and ORDER-WORKER.
//!
//! LEAD-WORKER re-normalizes `cpf`/`email` independently of INGRESS rather
//! than trusting upstream sanitization, so these helpers live here instead
//! of in the ingress crate.

use crate::error::PipelineError;

/// Strip everything but digits from a CPF and require exactly 11 digits.
pub fn normalize_cpf(raw: &str) -> Result<String, PipelineError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 11 {
        return Err(PipelineError::validation(
            "cpf",
            "cpf must normalize to exactly 11 digits",
        ));
    }
    Ok(digits)
}

/// Lowercase and trim an email address.
pub fn normalize_email(raw: &str) -> Result<String, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(PipelineError::validation("email", "email is malformed"));
    }
    Ok(trimmed.to_lowercase())
}

/// Normalize a Brazilian postal code to `NNNNN-NNN`.
///
/// Accepts either the bare 8-digit form (`"01234567"`) or the already
/// hyphenated form (`"01234-567"`), leaving the latter unchanged.
pub fn normalize_zip(raw: &str) -> Result<String, PipelineError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        return Err(PipelineError::validation(
            "zipCode",
            "zip code must contain 8 digits",
        ));
    }
    Ok(format!("{}-{}", &digits[0..5], &digits[5..8]))
}

/// Strip whitespace from a card number.
pub fn normalize_card_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Zero-pad an expiry month to 2 digits, validating it is in 1..=12.
pub fn normalize_expiry_month(month: u8) -> Result<String, PipelineError> {
    if !(1..=12).contains(&month) {
        return Err(PipelineError::validation(
            "expiryMonth",
            "expiry month must be between 1 and 12",
        ));
    }
    Ok(format!("{month:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_strips_punctuation() {
        assert_eq!(normalize_cpf("123.456.789-00").unwrap(), "12345678900");
    }

    #[test]
    fn cpf_rejects_wrong_length() {
        assert!(normalize_cpf("123").is_err());
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Jane@Example.COM ").unwrap(), "jane@example.com");
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert!(normalize_email("not-an-email").is_err());
    }

    #[test]
    fn zip_bare_digits_get_hyphenated() {
        assert_eq!(normalize_zip("01234567").unwrap(), "01234-567");
    }

    #[test]
    fn zip_already_hyphenated_is_unchanged() {
        assert_eq!(normalize_zip("01234-567").unwrap(), "01234-567");
    }

    #[test]
    fn card_number_strips_spaces() {
        assert_eq!(normalize_card_number("4111 1111 1111 1111"), "4111111111111111");
    }

    #[test]
    fn expiry_month_is_zero_padded() {
        assert_eq!(normalize_expiry_month(7).unwrap(), "07");
        assert_eq!(normalize_expiry_month(12).unwrap(), "12");
    }

    #[test]
    fn expiry_month_out_of_range_is_rejected() {
        assert!(normalize_expiry_month(0).is_err());
        assert!(normalize_expiry_month(13).is_err());
    }
}
