use std::collections::HashMap;

use bigdecimal::{BigDecimal, ToPrimitive};
use uuid::Uuid;

use super::errors::DomainError;

/// Metadata key under which the order id travels through the processor.
pub const ORDER_ID_METADATA_KEY: &str = "order_id";

/// One line of a hosted checkout session, priced in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub line_items: Vec<PaymentLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub payment_status: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionDetails {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Order id carried in the session metadata, if present and well formed.
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get(ORDER_ID_METADATA_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// What the caller should be sent to after asking to pay for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRedirect {
    /// Hosted checkout page for a freshly created session.
    Processor { session_id: String, url: String },
    /// The order is already paid; no session was created.
    AlreadyPaid { order_id: Uuid },
}

/// Converts a decimal amount into integer minor units (e.g. pence), rounding
/// to the nearest unit.
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, DomainError> {
    (amount * &BigDecimal::from(100))
        .round(0)
        .to_i64()
        .ok_or_else(|| DomainError::Internal(format!("amount {amount} out of range")))
}
