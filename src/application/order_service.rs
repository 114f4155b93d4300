use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::cart::Cart;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    max_order_total, page_offset, ListResult, NewOrder, NewOrderItem, Order, OrderStatus,
    ShippingInfo,
};
use crate::domain::payment::{
    to_minor_units, CheckoutSessionRequest, PaymentLineItem, PaymentRedirect,
    ORDER_ID_METADATA_KEY,
};
use crate::domain::ports::{OrderRepository, PaymentProcessor, ProductCatalog};
use crate::domain::principal::Principal;
use crate::domain::session::StoredSession;

/// Placeholder the processor substitutes with the real session id on redirect.
const SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public base URL the processor redirects back to, without trailing slash.
    pub public_base_url: String,
    /// ISO 4217 code, lowercase, applied to every line item.
    pub currency: String,
}

impl CheckoutSettings {
    fn success_url(&self) -> String {
        format!(
            "{}/payments/success?session_id={}",
            self.public_base_url, SESSION_ID_TEMPLATE
        )
    }

    fn cancel_url(&self) -> String {
        format!("{}/payments/cancelled", self.public_base_url)
    }
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn ProductCatalog>,
    payments: Arc<dyn PaymentProcessor>,
    settings: CheckoutSettings,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentProcessor>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders,
            catalog,
            payments,
            settings,
        }
    }

    /// Turns the session's cart into a pending order.
    ///
    /// The order, its items and the emptied cart are committed together, so
    /// the cart is cleared exactly when the order exists. On error `session`
    /// is left as it was.
    pub fn create_order(
        &self,
        principal: &Principal,
        session: &mut StoredSession,
        shipping: ShippingInfo,
    ) -> Result<Order, DomainError> {
        let mut checked_out = session.clone();
        let new_order = {
            let mut cart = Cart::load(&mut checked_out.data);
            if cart.is_empty() {
                return Err(DomainError::validation("cart is empty"));
            }
            let shipping = shipping.normalized()?;

            let items = cart
                .lines()
                .iter()
                .map(|line| {
                    Ok(NewOrderItem {
                        product_id: line.product_id,
                        price: line.unit_price.clone(),
                        quantity: i32::try_from(line.quantity)
                            .map_err(|_| DomainError::validation("quantity is too large"))?,
                    })
                })
                .collect::<Result<Vec<_>, DomainError>>()?;

            let total_amount = cart.total();
            let max_total = max_order_total();
            if total_amount > max_total {
                return Err(DomainError::validation(format!(
                    "order total {total_amount} exceeds the maximum of {max_total}"
                )));
            }

            cart.clear();
            NewOrder {
                owner_id: principal.user_id,
                shipping,
                total_amount,
                items,
            }
        };

        let order = self.orders.create(new_order, &checked_out)?;
        *session = checked_out;

        log::info!(
            "Created order {} for user {} ({} items, total {})",
            order.id,
            principal.user_id,
            order.items.len(),
            order.total_amount
        );
        Ok(order)
    }

    /// Returns the caller's order; other users' orders are reported as not found.
    pub fn get_order(&self, principal: &Principal, id: Uuid) -> Result<Order, DomainError> {
        self.orders
            .find_by_id(id)?
            .filter(|o| o.owner_id == principal.user_id)
            .ok_or(DomainError::NotFound)
    }

    pub fn order_history(
        &self,
        principal: &Principal,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        page_offset(page, limit)?;
        self.orders.list_for_owner(principal.user_id, page, limit)
    }

    /// Creates a hosted checkout session for the order, or short-circuits
    /// when it has already been paid. The order is only touched after the
    /// processor has answered successfully.
    pub fn initiate_payment(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<PaymentRedirect, DomainError> {
        let order = self.get_order(principal, order_id)?;

        if order.status.is_settled() {
            log::info!("Order {} already paid; skipping checkout session", order.id);
            return Ok(PaymentRedirect::AlreadyPaid { order_id: order.id });
        }
        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::validation("order has been cancelled"));
        }

        let request = self.session_request(&order)?;
        let session = self.payments.create_session(&request).map_err(|e| {
            log::warn!("Checkout session for order {} failed: {}", order.id, e);
            e
        })?;
        self.orders.set_payment_session(order.id, &session.id)?;

        log::info!(
            "Started checkout session {} for order {}",
            session.id,
            order.id
        );
        Ok(PaymentRedirect::Processor {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Marks the order referenced by the checkout session as paid.
    ///
    /// The order is resolved from the session's metadata as reported by the
    /// processor, never from anything the client sends.
    pub fn confirm_payment(
        &self,
        principal: &Principal,
        session_id: Option<&str>,
    ) -> Result<Order, DomainError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::validation("session_id is required"))?;

        let details = self.payments.retrieve_session(session_id).map_err(|e| {
            log::warn!("Retrieving checkout session {} failed: {}", session_id, e);
            e
        })?;
        let order_id = details.order_id().ok_or_else(|| {
            DomainError::validation("checkout session does not reference an order")
        })?;
        let order = self.get_order(principal, order_id)?;

        if order.status.is_settled() {
            return Ok(order);
        }
        if !details.is_paid() {
            return Err(DomainError::validation("payment has not been completed"));
        }

        let order = self.orders.mark_paid(order.id)?;
        log::info!("Order {} paid via session {}", order.id, session_id);
        Ok(order)
    }

    fn session_request(&self, order: &Order) -> Result<CheckoutSessionRequest, DomainError> {
        let product_ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = self
            .catalog
            .filter(&product_ids)?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let line_items = order
            .items
            .iter()
            .map(|item| {
                Ok(PaymentLineItem {
                    name: names
                        .get(&item.product_id)
                        .cloned()
                        .unwrap_or_else(|| format!("Item {}", item.product_id)),
                    unit_amount: to_minor_units(&item.price)?,
                    quantity: i64::from(item.quantity),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        // A retry of the same attempt reuses the key; a new attempt after a
        // previous session gets a fresh one.
        let attempt = if order.payment_initiated() {
            order.payment_session_id.as_str()
        } else {
            "initial"
        };

        Ok(CheckoutSessionRequest {
            currency: self.settings.currency.clone(),
            line_items,
            success_url: self.settings.success_url(),
            cancel_url: self.settings.cancel_url(),
            client_reference_id: order.id.to_string(),
            metadata: HashMap::from([(ORDER_ID_METADATA_KEY.to_string(), order.id.to_string())]),
            idempotency_key: format!("checkout-{}-{}", order.id, attempt),
        })
    }
}
