// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request body validation and sanitization for `POST /orders`.
//!
//! Validation failures surface verbatim as the `ValidationError` message
//! (the caller-visible half of the error taxonomy); sanitization happens
//! only here — downstream workers receive already-normalized fields except
//! for `cpf`/`email`, which LEAD-WORKER re-normalizes independently.

use chrono::Datelike;
use pipeline_core::error::PipelineError;
use pipeline_core::models::{AddressData, CustomerData, InitializeOrderEvent, OrderItemRequest, PaymentData};
use pipeline_core::normalize;
use serde::Deserialize;

/// Raw, unvalidated request body for `POST /orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub customer_data: RawCustomerData,
    pub items: Vec<RawOrderItem>,
    pub payment_data: RawPaymentData,
    pub address_data: RawAddressData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCustomerData {
    pub cpf: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderItem {
    pub id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaymentData {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvv: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAddressData {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub complement: Option<String>,
}

/// Validate and sanitize a raw request body into the shape published to
/// the INITIALIZE topic.
pub fn validate_and_sanitize(req: SubmitOrderRequest) -> Result<InitializeOrderEvent, PipelineError> {
    let customer_data = validate_customer(req.customer_data)?;
    let items = validate_items(req.items)?;
    let payment_data = validate_payment(req.payment_data)?;
    let address_data = validate_address(req.address_data)?;

    Ok(InitializeOrderEvent {
        order_id: String::new(), // assigned by the caller after this validates cleanly
        customer_data,
        payment_data: Some(payment_data),
        address_data: Some(address_data),
        items,
    })
}

fn validate_customer(raw: RawCustomerData) -> Result<CustomerData, PipelineError> {
    if raw.name.trim().is_empty() {
        return Err(PipelineError::validation("customerData.name", "name must not be empty"));
    }
    Ok(CustomerData {
        cpf: normalize::normalize_cpf(&raw.cpf)?,
        email: normalize::normalize_email(&raw.email)?,
        name: raw.name.trim().to_string(),
    })
}

fn validate_items(raw: Vec<RawOrderItem>) -> Result<Vec<OrderItemRequest>, PipelineError> {
    if raw.is_empty() {
        return Err(PipelineError::validation("items", "at least one item is required"));
    }
    raw.into_iter()
        .map(|item| {
            if item.id.trim().is_empty() {
                return Err(PipelineError::validation("items[].id", "item id must not be empty"));
            }
            if item.quantity < 0 {
                return Err(PipelineError::validation(
                    "items[].quantity",
                    "quantity must be a non-negative integer",
                ));
            }
            Ok(OrderItemRequest {
                id: item.id.trim().to_string(),
                quantity: item.quantity,
            })
        })
        .collect()
}

fn validate_payment(raw: RawPaymentData) -> Result<PaymentData, PipelineError> {
    let card_number = normalize::normalize_card_number(&raw.card_number);
    if card_number.len() != 16 || !card_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(PipelineError::validation(
            "paymentData.cardNumber",
            "card number must be 16 digits",
        ));
    }

    if raw.card_holder_name.trim().is_empty() {
        return Err(PipelineError::validation(
            "paymentData.cardHolderName",
            "card holder name must not be empty",
        ));
    }

    let expiry_month = normalize::normalize_expiry_month(raw.expiry_month)?;

    let current_year = chrono::Utc::now().year() as u16;
    if raw.expiry_year < current_year || raw.expiry_year > current_year + 10 {
        return Err(PipelineError::validation(
            "paymentData.expiryYear",
            "expiry year must be between the current year and 10 years out",
        ));
    }

    if raw.cvv.len() < 3 || raw.cvv.len() > 4 || !raw.cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(PipelineError::validation("paymentData.cvv", "cvv must be 3 or 4 digits"));
    }

    Ok(PaymentData {
        card_number,
        card_holder_name: raw.card_holder_name.trim().to_string(),
        expiry_month,
        expiry_year: raw.expiry_year,
        cvv: raw.cvv,
    })
}

fn validate_address(raw: RawAddressData) -> Result<AddressData, PipelineError> {
    for (field, value) in [
        ("street", &raw.street),
        ("number", &raw.number),
        ("neighborhood", &raw.neighborhood),
        ("city", &raw.city),
        ("state", &raw.state),
        ("country", &raw.country),
    ] {
        if value.trim().is_empty() {
            return Err(PipelineError::validation(
                format!("addressData.{field}"),
                format!("{field} must not be empty"),
            ));
        }
    }

    let zip_code = normalize::normalize_zip(&raw.zip_code)?;

    Ok(AddressData {
        street: raw.street.trim().to_string(),
        number: raw.number.trim().to_string(),
        neighborhood: raw.neighborhood.trim().to_string(),
        city: raw.city.trim().to_string(),
        state: raw.state.trim().to_uppercase(),
        zip_code,
        country: raw.country.trim().to_uppercase(),
        complement: raw.complement.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
    })
}
