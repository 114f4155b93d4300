use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::format_amount;
use super::session::{with_cart, VisitorSession};
use crate::application::cart::Cart;
use crate::domain::errors::DomainError;
use crate::domain::ports::{ProductCatalog, SessionStore};
use crate::errors::AppError;
use crate::state::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// How many to add; defaults to 1.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartLineRequest {
    /// New quantity for the line; 0 removes it.
    pub quantity: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub product_id: Uuid,
    /// `null` when the product is no longer in the catalog.
    pub name: Option<String>,
    pub quantity: u32,
    /// Price captured when the product was first added.
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub item_count: u64,
    pub total: String,
}

impl CartResponse {
    pub(crate) fn build<S: SessionStore + ?Sized>(
        cart: &Cart<'_, S>,
        catalog: &dyn ProductCatalog,
    ) -> Result<Self, DomainError> {
        let items = cart.items(catalog)?;
        Ok(Self {
            items: items
                .iter()
                .map(|item| CartLineResponse {
                    product_id: item.line.product_id,
                    name: item.product.map(|p| p.name.clone()),
                    quantity: item.line.quantity,
                    unit_price: format_amount(&item.line.unit_price),
                    line_total: format_amount(&item.line_total),
                })
                .collect(),
            item_count: cart.item_count(),
            total: format_amount(&cart.total()),
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /cart
#[utoipa::path(
    get,
    path = "/cart",
    responses(
        (status = 200, description = "The visitor's cart", body = CartResponse),
    ),
    tag = "cart"
)]
pub async fn view_cart(
    state: web::Data<AppState>,
    visitor: VisitorSession,
) -> Result<HttpResponse, AppError> {
    let st = state.clone();
    let (cart, saved) = web::block(move || {
        with_cart(&st, visitor.id, |cart| {
            CartResponse::build(cart, st.catalog.catalog())
        })
    })
    .await??;

    let mut response = HttpResponse::Ok();
    visitor.apply_cookie(&state, saved, &mut response);
    Ok(response.json(cart))
}

/// POST /cart/items
///
/// Adds the product to the cart, accumulating onto any existing line. The
/// line keeps the price the product had when it was first added.
#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Product not found"),
    ),
    tag = "cart"
)]
pub async fn add_item(
    state: web::Data<AppState>,
    visitor: VisitorSession,
    body: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let st = state.clone();
    let (cart, saved) = web::block(move || {
        with_cart(&st, visitor.id, |cart| {
            let product = st.catalog.get_product(body.product_id)?;
            cart.add(&product, body.quantity, false)?;
            CartResponse::build(cart, st.catalog.catalog())
        })
    })
    .await??;

    let mut response = HttpResponse::Ok();
    visitor.apply_cookie(&state, saved, &mut response);
    Ok(response.json(cart))
}

/// PUT /cart/items/{product_id}
///
/// Sets the line to exactly `quantity`; zero removes it.
#[utoipa::path(
    put,
    path = "/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    request_body = UpdateCartLineRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "cart"
)]
pub async fn update_item(
    state: web::Data<AppState>,
    visitor: VisitorSession,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCartLineRequest>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let quantity = body.into_inner().quantity;

    let st = state.clone();
    let (cart, saved) = web::block(move || {
        with_cart(&st, visitor.id, |cart| {
            let product = st.catalog.get_product(product_id)?;
            cart.add(&product, quantity, true)?;
            CartResponse::build(cart, st.catalog.catalog())
        })
    })
    .await??;

    let mut response = HttpResponse::Ok();
    visitor.apply_cookie(&state, saved, &mut response);
    Ok(response.json(cart))
}

/// DELETE /cart/items/{product_id}
///
/// Removing a product that is not in the cart is not an error.
#[utoipa::path(
    delete,
    path = "/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
    ),
    tag = "cart"
)]
pub async fn remove_item(
    state: web::Data<AppState>,
    visitor: VisitorSession,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let st = state.clone();
    let (cart, saved) = web::block(move || {
        with_cart(&st, visitor.id, |cart| {
            cart.remove(product_id)?;
            CartResponse::build(cart, st.catalog.catalog())
        })
    })
    .await??;

    let mut response = HttpResponse::Ok();
    visitor.apply_cookie(&state, saved, &mut response);
    Ok(response.json(cart))
}
