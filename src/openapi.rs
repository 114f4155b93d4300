use utoipa::OpenApi;

use crate::handlers::{cart, orders, payments, products};

#[derive(OpenApi)]
#[openapi(
    info(title = "Storefront API", description = "Catalog, session cart, checkout and payment"),
    paths(
        products::list_products,
        products::get_product,
        cart::view_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::initiate_payment,
        payments::payment_success,
        payments::payment_cancelled,
    ),
    components(schemas(
        products::ProductResponse,
        cart::AddToCartRequest,
        cart::UpdateCartLineRequest,
        cart::CartLineResponse,
        cart::CartResponse,
        orders::CheckoutRequest,
        orders::OrderItemResponse,
        orders::OrderResponse,
        orders::ListOrdersResponse,
        orders::PaymentRedirectResponse,
        payments::PaymentSuccessResponse,
        payments::PaymentCancelledResponse,
    )),
    tags(
        (name = "products", description = "Read-only product catalog"),
        (name = "cart", description = "Session-backed shopping cart"),
        (name = "orders", description = "Checkout and order history"),
        (name = "payments", description = "Hosted checkout handoff"),
    )
)]
pub struct ApiDoc;
