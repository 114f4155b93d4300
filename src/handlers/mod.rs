pub mod auth;
pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;
pub mod session;

use bigdecimal::BigDecimal;

/// Renders a currency amount with exactly two decimal places.
pub(crate) fn format_amount(amount: &BigDecimal) -> String {
    format!("{:.2}", amount)
}
