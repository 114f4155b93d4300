use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::cart::{CartItems, CartLine};
use crate::domain::errors::DomainError;
use crate::domain::ports::{ProductCatalog, SessionStore};
use crate::domain::product::Product;

/// Session key holding the serialized cart lines.
pub const CART_SESSION_KEY: &str = "cart";

/// A visitor's cart, backed by their session.
///
/// Every mutation writes the lines back into the session and marks it dirty;
/// a session without a readable cart is treated as an empty cart.
pub struct Cart<'s, S: SessionStore + ?Sized> {
    session: &'s mut S,
    lines: Vec<CartLine>,
}

impl<'s, S: SessionStore + ?Sized> Cart<'s, S> {
    pub fn load(session: &'s mut S) -> Self {
        let lines = match session.get(CART_SESSION_KEY) {
            Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable cart in session: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self { session, lines }
    }

    /// Adds `quantity` of `product`, or sets the line to exactly `quantity`
    /// when `override_quantity` is true. Setting a line to zero removes it.
    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        override_quantity: bool,
    ) -> Result<(), DomainError> {
        if !override_quantity && quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        let index = match self.position(product.id) {
            Some(index) => index,
            None => {
                self.lines.push(CartLine {
                    product_id: product.id,
                    quantity: 0,
                    unit_price: product.price.clone(),
                });
                self.lines.len() - 1
            }
        };

        let new_quantity = if override_quantity {
            quantity
        } else {
            self.lines[index]
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| DomainError::validation("quantity is too large"))?
        };

        if new_quantity == 0 {
            self.lines.remove(index);
        } else {
            self.lines[index].quantity = new_quantity;
        }
        self.save()
    }

    pub fn remove(&mut self, product_id: Uuid) -> Result<(), DomainError> {
        match self.position(product_id) {
            Some(index) => {
                self.lines.remove(index);
                self.save()
            }
            None => Ok(()),
        }
    }

    /// Resolves every line's product with a single catalog lookup.
    pub fn items(&self, catalog: &dyn ProductCatalog) -> Result<CartItems, DomainError> {
        let ids: Vec<Uuid> = self.lines.iter().map(|l| l.product_id).collect();
        let products = if ids.is_empty() {
            Vec::new()
        } else {
            catalog.filter(&ids)?
        };
        Ok(CartItems::new(self.lines.clone(), products))
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn total(&self) -> BigDecimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.session.remove(CART_SESSION_KEY);
        self.session.mark_dirty();
    }

    fn position(&self, product_id: Uuid) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }

    fn save(&mut self) -> Result<(), DomainError> {
        let value = serde_json::to_value(&self.lines)
            .map_err(|e| DomainError::Internal(format!("serialize cart: {e}")))?;
        self.session.set(CART_SESSION_KEY, value);
        self.session.mark_dirty();
        Ok(())
    }
}
