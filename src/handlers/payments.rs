use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::orders::OrderResponse;
use crate::domain::principal::Principal;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentSuccessParams {
    /// Checkout session id substituted in by the payment processor.
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSuccessResponse {
    pub message: String,
    pub order: OrderResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentCancelledResponse {
    pub message: String,
    pub redirect_url: String,
}

/// GET /payments/success
///
/// Return leg from the hosted checkout. The session is looked up with the
/// processor and its order is marked paid once the processor reports the
/// payment as complete. Revisiting the page is harmless.
#[utoipa::path(
    get,
    path = "/payments/success",
    params(PaymentSuccessParams),
    responses(
        (status = 200, description = "Order paid", body = PaymentSuccessResponse),
        (status = 400, description = "Missing session id or payment not completed"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment processor unavailable"),
    ),
    tag = "payments"
)]
pub async fn payment_success(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<PaymentSuccessParams>,
) -> Result<HttpResponse, AppError> {
    let session_id = query.into_inner().session_id;

    let order = web::block(move || {
        state
            .orders
            .confirm_payment(&principal, session_id.as_deref())
    })
    .await??;

    Ok(HttpResponse::Ok().json(PaymentSuccessResponse {
        message: "Payment received. Thank you for your order.".to_string(),
        order: OrderResponse::from(order),
    }))
}

/// GET /payments/cancelled
///
/// Return leg when the customer abandons the hosted checkout. Nothing
/// changes; the order stays pending and can be paid later.
#[utoipa::path(
    get,
    path = "/payments/cancelled",
    responses(
        (status = 200, description = "Checkout abandoned", body = PaymentCancelledResponse),
    ),
    tag = "payments"
)]
pub async fn payment_cancelled() -> HttpResponse {
    HttpResponse::Ok().json(PaymentCancelledResponse {
        message: "Payment was cancelled. Your order is still pending.".to_string(),
        redirect_url: "/cart".to_string(),
    })
}
