use std::sync::Arc;

use crate::application::catalog_service::CatalogService;
use crate::application::order_service::{CheckoutSettings, OrderService};
use crate::domain::ports::{OrderRepository, PaymentProcessor, ProductCatalog, SessionRepository};

/// Shared application state handed to every handler.
pub struct AppState {
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub sessions: Arc<dyn SessionRepository>,
    pub session_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

/// The collaborators the service is wired from.
pub struct Ports {
    pub catalog: Arc<dyn ProductCatalog>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl AppState {
    pub fn new(
        ports: Ports,
        checkout: CheckoutSettings,
        session_ttl: chrono::Duration,
        secure_cookies: bool,
    ) -> Self {
        Self {
            catalog: CatalogService::new(ports.catalog.clone()),
            orders: OrderService::new(ports.orders, ports.catalog, ports.payments, checkout),
            sessions: ports.sessions,
            session_ttl,
            secure_cookies,
        }
    }
}
