use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{ListResult, NewOrder, Order};
use super::payment::{CheckoutSession, CheckoutSessionDetails, CheckoutSessionRequest};
use super::product::Product;
use super::session::{SessionData, StoredSession};

pub trait ProductCatalog: Send + Sync + 'static {
    fn get(&self, id: Uuid) -> Result<Option<Product>, DomainError>;
    /// Batched lookup; unknown ids are simply absent from the result.
    fn filter(&self, ids: &[Uuid]) -> Result<Vec<Product>, DomainError>;
    fn list(&self, limit: i64) -> Result<Vec<Product>, DomainError>;
}

/// In-memory session bag the cart reads from and writes to.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
    /// Flags the session so the request persists it on the way out.
    fn mark_dirty(&mut self);
}

pub trait SessionRepository: Send + Sync + 'static {
    fn load(&self, session_id: Uuid) -> Result<Option<SessionData>, DomainError>;
    fn save(
        &self,
        session_id: Uuid,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
    fn delete_expired(&self) -> Result<usize, DomainError>;
}

pub trait OrderRepository: Send + Sync + 'static {
    /// Persists the order, all of its items and the checked-out visitor's
    /// session in one transaction; either all of them are written or none.
    fn create(&self, order: NewOrder, session: &StoredSession) -> Result<Order, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn list_for_owner(&self, owner_id: Uuid, page: i64, limit: i64)
        -> Result<ListResult, DomainError>;
    fn set_payment_session(&self, id: Uuid, session_id: &str) -> Result<(), DomainError>;
    fn mark_paid(&self, id: Uuid) -> Result<Order, DomainError>;
}

pub trait PaymentProcessor: Send + Sync + 'static {
    fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError>;
    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSessionDetails, DomainError>;
}
