use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::format_amount;
use super::session::{load_session, VisitorSession};
use crate::domain::order::{Order, OrderItem, ShippingInfo};
use crate::domain::payment::PaymentRedirect;
use crate::domain::principal::Principal;
use crate::errors::AppError;
use crate::state::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

/// Shipping details entered at checkout.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl From<CheckoutRequest> for ShippingInfo {
    fn from(r: CheckoutRequest) -> Self {
        ShippingInfo {
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            address: r.address,
            postal_code: r.postal_code,
            city: r.city,
            country: r.country,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Unit price at checkout.
    pub price: String,
    pub quantity: i32,
    pub cost: String,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(i: &OrderItem) -> Self {
        Self {
            id: i.id,
            product_id: i.product_id,
            price: format_amount(&i.price),
            quantity: i.quantity,
            cost: format_amount(&i.cost()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    /// One of pending, paid, shipped, delivered, cancelled.
    pub status: String,
    pub total_amount: String,
    /// Empty until payment has been started.
    pub payment_session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            items: o.items.iter().map(OrderItemResponse::from).collect(),
            first_name: o.shipping.first_name,
            last_name: o.shipping.last_name,
            email: o.shipping.email,
            address: o.shipping.address,
            postal_code: o.shipping.postal_code,
            city: o.shipping.city,
            country: o.shipping.country,
            status: o.status.to_string(),
            total_amount: format_amount(&o.total_amount),
            payment_session_id: o.payment_session_id,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentRedirectResponse {
    /// Where the client should go next: the hosted checkout page, or the
    /// order itself when it has already been paid.
    pub redirect_url: String,
    pub already_paid: bool,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Checks out the visitor's cart: the order, all of its items and the
/// emptied cart are written in one transaction, so a failed checkout leaves
/// both the cart and the order table as they were.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Empty cart or invalid shipping details"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    principal: Principal,
    visitor: VisitorSession,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let shipping = ShippingInfo::from(body.into_inner());

    let st = state.clone();
    let order = web::block(move || {
        let mut session = load_session(&st, visitor.id)?;
        st.orders.create_order(&principal, &mut session, shipping)
    })
    .await??;

    let mut response = HttpResponse::Created();
    visitor.apply_cookie(&state, true, &mut response);
    Ok(response.json(OrderResponse::from(order)))
}

/// GET /orders/{id}
///
/// Returns one of the caller's orders with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || state.orders.get_order(&principal, order_id)).await??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// The caller's order history, newest first.
/// Use `page` (1-based) and `limit` to control pagination.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 401, description = "Not signed in"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result =
        web::block(move || state.orders.order_history(&principal, page, limit)).await??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// POST /orders/{id}/payment
///
/// Starts a hosted checkout for the order and redirects the client to it.
/// An order that is already paid redirects back to itself.
#[utoipa::path(
    post,
    path = "/orders/{id}/payment",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 303, description = "Redirect to the checkout page", body = PaymentRedirectResponse),
        (status = 400, description = "Order cannot be paid"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment processor unavailable"),
    ),
    tag = "payments"
)]
pub async fn initiate_payment(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let redirect =
        web::block(move || state.orders.initiate_payment(&principal, order_id)).await??;

    let body = match redirect {
        PaymentRedirect::Processor { url, .. } => PaymentRedirectResponse {
            redirect_url: url,
            already_paid: false,
        },
        PaymentRedirect::AlreadyPaid { order_id } => PaymentRedirectResponse {
            redirect_url: format!("/orders/{order_id}"),
            already_paid: true,
        },
    };

    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, body.redirect_url.clone()))
        .json(body))
}
