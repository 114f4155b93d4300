use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether payment has already been settled for an order in this state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Internal(format!("unknown order status '{other}'"))),
        }
    }
}

/// Shipping details collected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl ShippingInfo {
    /// Trims every field and rejects blank or oversized values.
    pub fn normalized(self) -> Result<Self, DomainError> {
        let info = ShippingInfo {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            address: self.address.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            city: self.city.trim().to_string(),
            country: self.country.trim().to_string(),
        };

        for (field, value, max_len) in [
            ("first_name", &info.first_name, 100),
            ("last_name", &info.last_name, 100),
            ("email", &info.email, 254),
            ("address", &info.address, 250),
            ("postal_code", &info.postal_code, 20),
            ("city", &info.city, 100),
            ("country", &info.country, 100),
        ] {
            if value.is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
            if value.chars().count() > max_len {
                return Err(DomainError::validation(format!(
                    "{field} must be at most {max_len} characters"
                )));
            }
        }

        match info.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(info),
            _ => Err(DomainError::validation("email is not a valid address")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub price: BigDecimal,
    pub quantity: i32,
}

impl OrderItem {
    pub fn cost(&self) -> BigDecimal {
        &self.price * &BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    /// Empty until a hosted checkout session has been created.
    pub payment_session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn payment_initiated(&self) -> bool {
        !self.payment_session_id.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub price: BigDecimal,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: Uuid,
    pub shipping: ShippingInfo,
    pub total_amount: BigDecimal,
    pub items: Vec<NewOrderItem>,
}

/// Largest amount `orders.total_amount` (NUMERIC(10, 2)) can hold.
pub fn max_order_total() -> BigDecimal {
    BigDecimal::from(9_999_999_999_i64) / BigDecimal::from(100)
}

/// Row offset of a 1-based page; pages too far out to address are rejected.
pub fn page_offset(page: i64, limit: i64) -> Result<i64, DomainError> {
    page.checked_sub(1)
        .filter(|p| *p >= 0)
        .and_then(|p| p.checked_mul(limit))
        .ok_or_else(|| DomainError::validation("page is out of range"))
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<Order>,
    pub total: i64,
}

#[cfg(test)]
pub(crate) fn sample_shipping() -> ShippingInfo {
    ShippingInfo {
        first_name: "Harry".to_string(),
        last_name: "Dickerson".to_string(),
        email: "harry@example.com".to_string(),
        address: "1 Mill Lane".to_string(),
        postal_code: "M1 1AA".to_string(),
        city: "Manchester".to_string(),
        country: "United Kingdom".to_string(),
    }
}
