//! In-memory port implementations shared by unit and handler tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::web;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::order_service::CheckoutSettings;
use crate::domain::errors::DomainError;
use crate::domain::order::{page_offset, ListResult, NewOrder, Order, OrderItem, OrderStatus};
use crate::domain::payment::{CheckoutSession, CheckoutSessionDetails, CheckoutSessionRequest};
use crate::domain::ports::{OrderRepository, PaymentProcessor, ProductCatalog, SessionRepository};
use crate::domain::product::Product;
use crate::domain::session::{SessionData, StoredSession};
use crate::state::{AppState, Ports};

pub fn product(name: &str, price: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price: BigDecimal::from_str(price).expect("valid decimal"),
        created_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<Vec<Product>>,
    filter_calls: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn with(products: Vec<Product>) -> Self {
        Self {
            products: Mutex::new(products),
            filter_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_price(&self, id: Uuid, price: &str) {
        let mut products = self.products.lock().unwrap();
        if let Some(p) = products.iter_mut().find(|p| p.id == id) {
            p.price = BigDecimal::from_str(price).expect("valid decimal");
        }
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn get(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    fn filter(&self, ids: &[Uuid]) -> Result<Vec<Product>, DomainError> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    fn list(&self, limit: i64) -> Result<Vec<Product>, DomainError> {
        let mut products = self.products.lock().unwrap().clone();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(products)
    }
}

/// Order store that can be told to fail the next write, mimicking a rolled
/// back transaction. Checkout writes the visitor's session into `sessions`
/// as part of the same all-or-nothing step.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<Vec<Order>>,
    sessions: Arc<InMemorySessionRepository>,
    fail_writes: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn with_sessions(sessions: Arc<InMemorySessionRepository>) -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            sessions,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Session contents last written alongside an order.
    pub fn committed_session(&self, session_id: Uuid) -> Option<SessionData> {
        self.sessions.stored(session_id)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub fn insert(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn create(&self, order: NewOrder, session: &StoredSession) -> Result<Order, DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("write failed".to_string()));
        }
        self.sessions
            .save(session.id, &session.data, session.expires_at)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let created = Order {
            id,
            owner_id: order.owner_id,
            shipping: order.shipping,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            payment_session_id: String::new(),
            created_at: now,
            updated_at: now,
            items: order
                .items
                .into_iter()
                .map(|i| OrderItem {
                    id: Uuid::new_v4(),
                    order_id: id,
                    product_id: i.product_id,
                    price: i.price,
                    quantity: i.quantity,
                })
                .collect(),
        };
        self.orders.lock().unwrap().push(created.clone());
        Ok(created)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.get(id))
    }

    fn list_for_owner(
        &self,
        owner_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let mut owned: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = owned.len() as i64;
        let offset = page_offset(page, limit)?;
        let items = owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();
        Ok(ListResult { items, total })
    }

    fn set_payment_session(&self, id: Uuid, session_id: &str) -> Result<(), DomainError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(DomainError::NotFound)?;
        order.payment_session_id = session_id.to_string();
        order.updated_at = Utc::now();
        Ok(())
    }

    fn mark_paid(&self, id: Uuid) -> Result<Order, DomainError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(DomainError::NotFound)?;
        order.status = OrderStatus::Paid;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

/// Hosted-checkout stand-in that records every session it is asked to create.
#[derive(Default)]
pub struct StubPaymentProcessor {
    created: Mutex<Vec<CheckoutSessionRequest>>,
    sessions: Mutex<HashMap<String, CheckoutSessionDetails>>,
    unavailable: AtomicBool,
}

impl StubPaymentProcessor {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<CheckoutSessionRequest> {
        self.created.lock().unwrap().clone()
    }

    /// Flags a previously created session as paid, as the hosted page would.
    pub fn complete(&self, session_id: &str) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(session_id) {
            s.payment_status = "paid".to_string();
        }
    }

    pub fn insert_session(&self, details: CheckoutSessionDetails) {
        self.sessions
            .lock()
            .unwrap()
            .insert(details.id.clone(), details);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::Processor("connection refused".to_string()));
        }
        Ok(())
    }
}

impl PaymentProcessor for StubPaymentProcessor {
    fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError> {
        self.check_available()?;
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("cs_test_{}", created.len());
        self.insert_session(CheckoutSessionDetails {
            id: id.clone(),
            payment_status: "unpaid".to_string(),
            metadata: request.metadata.clone(),
        });
        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }

    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSessionDetails, DomainError> {
        self.check_available()?;
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| DomainError::Processor(format!("No such checkout session: {session_id}")))
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<Uuid, (SessionData, DateTime<Utc>)>>,
    fail_saves: AtomicBool,
}

impl InMemorySessionRepository {
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Makes every save fail until reset, like a dropped database connection.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self, session_id: Uuid) -> Option<SessionData> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|(data, _)| data.clone())
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn load(&self, session_id: Uuid) -> Result<Option<SessionData>, DomainError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(data, _)| SessionData::from_values(data.values().clone())))
    }

    fn save(
        &self,
        session_id: Uuid,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("session write failed".to_string()));
        }
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id, (data.clone(), expires_at));
        Ok(())
    }

    fn delete_expired(&self) -> Result<usize, DomainError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        let now = Utc::now();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - sessions.len())
    }
}

/// Application state wired entirely from in-memory ports, with handles kept
/// so tests can inspect what the handlers did.
pub struct TestApp {
    pub catalog: Arc<InMemoryCatalog>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub payments: Arc<StubPaymentProcessor>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub data: web::Data<AppState>,
}

impl TestApp {
    pub fn with_products(products: Vec<Product>) -> Self {
        let catalog = Arc::new(InMemoryCatalog::with(products));
        let sessions = Arc::new(InMemorySessionRepository::default());
        let orders = Arc::new(InMemoryOrderRepository::with_sessions(sessions.clone()));
        let payments = Arc::new(StubPaymentProcessor::default());

        let state = AppState::new(
            Ports {
                catalog: catalog.clone(),
                orders: orders.clone(),
                payments: payments.clone(),
                sessions: sessions.clone(),
            },
            CheckoutSettings {
                public_base_url: "http://shop.test".to_string(),
                currency: "gbp".to_string(),
            },
            chrono::Duration::days(14),
            false,
        );

        Self {
            catalog,
            orders,
            payments,
            sessions,
            data: web::Data::new(state),
        }
    }
}
