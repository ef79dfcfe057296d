// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deterministic simulation of the payment gateway: card-suffix override,
//! value-tiered approval probability, and bounded artificial latency.
//!
//! The probability decision is split from the random-number generation so
//! the decision table itself (the part with interesting invariants) can be
//! unit-tested without depending on RNG behavior.

use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;

/// Base artificial delay before a gateway response, in milliseconds.
pub const BASE_DELAY_MS: u64 = 200;
/// Maximum jitter added on top of [`BASE_DELAY_MS`], in milliseconds.
pub const MAX_JITTER_MS: u64 = 500;
/// Probability the gateway returns a bare `ERROR` outcome.
pub const FAIL_PROBABILITY: f64 = 0.03;

/// Messages a simulated `ERROR` outcome is drawn from.
pub const ERROR_MESSAGES: &[&str] = &["timeout", "service unavailable", "merchant config", "network"];

/// Amount tier boundaries, in the same currency unit as [`Decimal`] amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// `>= 10_000`.
    High,
    /// `>= 1_000`.
    Medium,
    /// Everything else.
    Low,
}

impl Tier {
    /// Classify an order total into its pricing tier.
    pub fn for_amount(amount: Decimal) -> Self {
        if amount >= Decimal::from(10_000) {
            Tier::High
        } else if amount >= Decimal::from(1_000) {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    /// Approval probability for this tier, absent the always-declined
    /// card-suffix override.
    pub fn approval_probability(self) -> f64 {
        match self {
            Tier::High => 0.75,
            Tier::Medium => 0.85,
            Tier::Low => 0.95,
        }
    }
}

/// Outcome of one simulated gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    /// Approved; carries a synthetic auth code.
    Approved { auth_code: String },
    /// Declined (either by the tier roll or the card-suffix override).
    Declined,
    /// A gateway-side error, unrelated to the card or amount.
    Error { message: String },
}

/// Whether a card number is always declined regardless of tier.
pub fn is_always_declined(card_number: &str) -> bool {
    card_number.ends_with("0000")
}

/// Decide the outcome given pre-drawn random rolls in `[0, 1)`, so the
/// decision table is testable without depending on actual randomness.
///
/// `fail_roll` is checked first (`< FAIL_PROBABILITY` ⇒ error); otherwise
/// the card-suffix override is checked; otherwise `approval_roll` is
/// compared against the tier's approval probability.
pub fn decide(card_number: &str, amount: Decimal, fail_roll: f64, approval_roll: f64, error_pick: usize) -> GatewayOutcome {
    if fail_roll < FAIL_PROBABILITY {
        let message = ERROR_MESSAGES[error_pick % ERROR_MESSAGES.len()];
        return GatewayOutcome::Error {
            message: message.to_string(),
        };
    }

    if is_always_declined(card_number) {
        return GatewayOutcome::Declined;
    }

    let tier = Tier::for_amount(amount);
    if approval_roll < tier.approval_probability() {
        GatewayOutcome::Approved {
            auth_code: synthetic_auth_code(),
        }
    } else {
        GatewayOutcome::Declined
    }
}

fn synthetic_auth_code() -> String {
    format!("auth_{}", uuid::Uuid::new_v4().simple())
}

/// Draw the gateway's decision and simulated processing delay using real
/// randomness. The delay is returned so the caller can apply it (or, in
/// tests, skip applying it while still exercising the decision logic).
pub fn simulate(card_number: &str, amount: Decimal) -> (GatewayOutcome, Duration) {
    let mut rng = rand::thread_rng();
    let fail_roll: f64 = rng.r#gen();
    let approval_roll: f64 = rng.r#gen();
    let error_pick: usize = rng.gen_range(0..ERROR_MESSAGES.len());
    let jitter_ms: u64 = rng.gen_range(0..=MAX_JITTER_MS);

    let outcome = decide(card_number, amount, fail_roll, approval_roll, error_pick);
    (outcome, Duration::from_millis(BASE_DELAY_MS + jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_classify_correctly() {
        assert_eq!(Tier::for_amount(Decimal::from(10_000)), Tier::High);
        assert_eq!(Tier::for_amount(Decimal::from(9_999)), Tier::Medium);
        assert_eq!(Tier::for_amount(Decimal::from(1_000)), Tier::Medium);
        assert_eq!(Tier::for_amount(Decimal::from(999)), Tier::Low);
    }

    #[test]
    fn card_ending_in_0000_is_always_declined_regardless_of_tier_or_roll() {
        let outcome = decide("4111111111110000", Decimal::from(50_000), 0.5, 0.0, 0);
        assert_eq!(outcome, GatewayOutcome::Declined);
    }

    #[test]
    fn fail_roll_below_threshold_yields_error_before_the_suffix_check() {
        let outcome = decide("4111111111110000", Decimal::from(100), 0.01, 0.0, 2);
        assert_eq!(
            outcome,
            GatewayOutcome::Error {
                message: "merchant config".to_string()
            }
        );
    }

    #[test]
    fn approval_roll_under_tier_probability_approves() {
        let outcome = decide("4111111111111111", Decimal::from(100), 0.5, 0.5, 0);
        assert!(matches!(outcome, GatewayOutcome::Approved { .. }));
    }

    #[test]
    fn approval_roll_over_tier_probability_declines() {
        let outcome = decide("4111111111111111", Decimal::from(100), 0.5, 0.99, 0);
        assert_eq!(outcome, GatewayOutcome::Declined);
    }

    #[test]
    fn high_tier_is_harder_to_approve_than_low_tier() {
        assert!(Tier::High.approval_probability() < Tier::Medium.approval_probability());
        assert!(Tier::Medium.approval_probability() < Tier::Low.approval_probability());
    }
}
