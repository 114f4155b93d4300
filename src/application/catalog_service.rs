use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::ports::ProductCatalog;
use crate::domain::product::Product;

pub const DEFAULT_PRODUCT_LIMIT: i64 = 50;
pub const MAX_PRODUCT_LIMIT: i64 = 100;

pub struct CatalogService {
    catalog: Arc<dyn ProductCatalog>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.catalog.as_ref()
    }

    pub fn get_product(&self, id: Uuid) -> Result<Product, DomainError> {
        self.catalog.get(id)?.ok_or(DomainError::NotFound)
    }

    pub fn list_products(&self, limit: Option<i64>) -> Result<Vec<Product>, DomainError> {
        let limit = limit
            .unwrap_or(DEFAULT_PRODUCT_LIMIT)
            .clamp(1, MAX_PRODUCT_LIMIT);
        self.catalog.list(limit)
    }
}
