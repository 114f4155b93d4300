use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::ProductCatalog;
use crate::domain::product::Product;
use crate::schema::products;

use super::models::ProductRow;

pub struct DieselProductCatalog {
    pool: DbPool,
}

impl DieselProductCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for DieselProductCatalog {
    fn get(&self, id: Uuid) -> Result<Option<Product>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = products::table
            .find(id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(Product::from))
    }

    fn filter(&self, ids: &[Uuid]) -> Result<Vec<Product>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows: Vec<ProductRow> = products::table
            .filter(products::id.eq_any(ids.to_vec()))
            .select(ProductRow::as_select())
            .load(&mut conn)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    fn list(&self, limit: i64) -> Result<Vec<Product>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows: Vec<ProductRow> = products::table
            .select(ProductRow::as_select())
            .order(products::created_at.desc())
            .limit(limit)
            .load(&mut conn)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}
