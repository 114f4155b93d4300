use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::format_amount;
use crate::domain::product::Product;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    /// Decimal price as a string, e.g. "19.99"
    pub price: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: format_amount(&p.price),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListProductsParams {
    /// Maximum number of products to return (1-100, default 50).
    pub limit: Option<i64>,
}

/// GET /products
#[utoipa::path(
    get,
    path = "/products",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of products (default 50, max 100)"),
    ),
    responses(
        (status = 200, description = "Newest products first", body = [ProductResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "products"
)]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ListProductsParams>,
) -> Result<HttpResponse, AppError> {
    let limit = query.into_inner().limit;

    let products = web::block(move || state.catalog.list_products(limit)).await??;

    let body: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn get_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let product = web::block(move || state.catalog.get_product(id)).await??;

    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}
