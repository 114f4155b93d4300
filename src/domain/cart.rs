use std::collections::HashMap;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

/// One product's entry in a visitor's cart.
///
/// `unit_price` is captured when the line is first created and is never
/// refreshed from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

impl CartLine {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * &BigDecimal::from(self.quantity)
    }
}

/// Cart lines joined with the products they reference.
///
/// Built from one batched catalog lookup; iterate it as many times as needed.
#[derive(Debug, Clone)]
pub struct CartItems {
    lines: Vec<CartLine>,
    products: HashMap<Uuid, Product>,
}

#[derive(Debug, Clone)]
pub struct CartItem<'a> {
    pub line: &'a CartLine,
    /// `None` when the product has been removed from the catalog since it was added.
    pub product: Option<&'a Product>,
    pub line_total: BigDecimal,
}

impl CartItems {
    pub fn new(lines: Vec<CartLine>, products: Vec<Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self { lines, products }
    }

    pub fn iter(&self) -> impl Iterator<Item = CartItem<'_>> + '_ {
        self.lines.iter().map(move |line| CartItem {
            line,
            product: self.products.get(&line.product_id),
            line_total: line.line_total(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
