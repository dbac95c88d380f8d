//! Visitor session endpoints: cart, comparator, view mode and cart checkout.

use crate::{
    errors::ServiceError,
    services::{
        orders::{CheckoutLine, CheckoutRequest, CheckoutResponse},
        products::ProductDetail,
    },
    storefront::{Cart, CartItem, CompareOutcome, SessionState, StorefrontSession, ViewMode},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn storefront_routes() -> Router<AppState> {
    Router::new()
        .route("/:session_id", get(get_session))
        .route("/:session_id/cart", delete(clear_cart))
        .route("/:session_id/cart/items", post(add_cart_item))
        .route("/:session_id/cart/items/:line_id", delete(remove_cart_item))
        .route(
            "/:session_id/cart/items/:line_id/increment",
            post(increment_cart_item),
        )
        .route(
            "/:session_id/cart/items/:line_id/decrement",
            post(decrement_cart_item),
        )
        .route("/:session_id/compare", get(compared_products).delete(clear_comparator))
        .route("/:session_id/compare/:product_id", post(toggle_compare))
        .route("/:session_id/view-mode", put(set_view_mode))
        .route("/:session_id/checkout", post(checkout_cart))
}

/// Session state with the cart totals worked out
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub session_id: String,
    #[serde(flatten)]
    pub state: SessionState,
    pub item_count: i32,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

/// Holds the session's lock until the returned session is dropped
async fn open(state: &AppState, session_id: &str) -> Result<StorefrontSession, ServiceError> {
    StorefrontSession::open_exclusive(
        state.services.sessions.clone(),
        &state.services.session_locks,
        session_id,
    )
    .await
}

fn checkout_lines(cart: &Cart) -> Vec<CheckoutLine> {
    cart.items()
        .iter()
        .map(|line| CheckoutLine {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
        })
        .collect()
}

/// Re-prices the cart the way checkout will, so the totals shown are the order's
async fn view(state: &AppState, session: &StorefrontSession) -> Result<SessionView, ServiceError> {
    let mut current = session.state().clone();
    let mut totals = None;

    if !current.cart.is_empty() {
        let lines = checkout_lines(&current.cart);
        match state
            .services
            .orders
            .quote_cart(current.customer_id, &lines)
            .await
        {
            Ok(priced) => {
                let ids: Vec<String> =
                    current.cart.items().iter().map(|i| i.id.clone()).collect();
                for (id, line) in ids.iter().zip(&priced.lines) {
                    current
                        .cart
                        .reprice(id, line.price.list_price(), line.price.discount_amount);
                }
                totals = Some((priced.subtotal, priced.discount_amount, priced.total));
            }
            // A line went unavailable or out of range after it was added; checkout rejects it
            Err(ServiceError::NotFound(reason) | ServiceError::ValidationError(reason)) => {
                debug!(session_id = session.id(), %reason, "showing saved cart prices");
            }
            Err(e) => return Err(e),
        }
    }

    let cart = &current.cart;
    let (subtotal, discount_amount, total) =
        totals.unwrap_or_else(|| (cart.subtotal(), cart.discount_amount(), cart.total()));
    Ok(SessionView {
        session_id: session.id().to_string(),
        item_count: cart.item_count(),
        subtotal,
        discount_amount,
        total,
        state: current,
    })
}

fn line_not_found(line_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Cart line {} not found", line_id))
}

#[utoipa::path(
    get,
    path = "/api/v1/storefront/{session_id}",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    responses((status = 200, description = "Session with cart totals", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = open(&state, &session_id).await?;
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    /// Prices the line for this customer
    pub customer_id: Option<Uuid>,
    /// Units to add; one when absent
    #[validate(range(min = 1, max = 10000))]
    pub quantity: Option<i32>,
}

/// Adds a product to the cart at the price resolved for the visitor.
///
/// A `customer_id` sticks to the session and prices the whole cart.
#[utoipa::path(
    post,
    path = "/api/v1/storefront/{session_id}/cart/items",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    request_body = AddCartItem,
    responses(
        (status = 200, description = "Updated session", body = ApiResponse<SessionView>),
        (status = 404, description = "Unknown product or variant", body = crate::errors::ErrorResponse),
    ),
    tag = "Storefront"
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<AddCartItem>,
) -> ApiResult<SessionView> {
    payload.validate()?;
    let mut session = open(&state, &session_id).await?;

    let detail = state.services.products.get(payload.product_id).await?;
    if !detail.product.active {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            payload.product_id
        )));
    }
    let quote = state
        .services
        .pricing
        .quote(
            payload.product_id,
            payload.variant_id,
            payload.customer_id,
            payload.quantity.unwrap_or(1),
        )
        .await?;
    let item = cart_item(&detail, payload.variant_id, quote.breakdown.list_price())
        .with_discount(quote.breakdown.discount_amount);
    if let Some(customer_id) = payload.customer_id {
        session.set_customer(customer_id);
    }

    match payload.quantity {
        Some(quantity) if quantity > 1 => session.add_quantity(item, quantity).await?,
        _ => session.add_to_cart(item).await?,
    }
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

fn cart_item(detail: &ProductDetail, variant_id: Option<Uuid>, price: Decimal) -> CartItem {
    let variant = variant_id.and_then(|id| detail.variants.iter().find(|v| v.id == id));
    let name = match variant {
        Some(v) => format!("{} - {}", detail.product.name, v.name),
        None => detail.product.name.clone(),
    };
    let image = detail
        .images
        .iter()
        .find(|i| i.is_primary)
        .or_else(|| detail.images.first())
        .map(|i| i.url.clone());
    CartItem::new(detail.product.id, variant_id, name, price).with_image(image)
}

#[utoipa::path(
    post,
    path = "/api/v1/storefront/{session_id}/cart/items/{line_id}/increment",
    params(
        ("session_id" = String, Path, description = "Client-generated session id"),
        ("line_id" = String, Path, description = "Cart line id"),
    ),
    responses((status = 200, description = "Updated session", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn increment_cart_item(
    State(state): State<AppState>,
    Path((session_id, line_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    if !session.increment(&line_id).await? {
        return Err(line_not_found(&line_id));
    }
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

/// Takes one unit off a line; the last unit removes the line
#[utoipa::path(
    post,
    path = "/api/v1/storefront/{session_id}/cart/items/{line_id}/decrement",
    params(
        ("session_id" = String, Path, description = "Client-generated session id"),
        ("line_id" = String, Path, description = "Cart line id"),
    ),
    responses((status = 200, description = "Updated session", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn decrement_cart_item(
    State(state): State<AppState>,
    Path((session_id, line_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    if !session.decrement(&line_id).await? {
        return Err(line_not_found(&line_id));
    }
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/storefront/{session_id}/cart/items/{line_id}",
    params(
        ("session_id" = String, Path, description = "Client-generated session id"),
        ("line_id" = String, Path, description = "Cart line id"),
    ),
    responses((status = 200, description = "Updated session", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path((session_id, line_id)): Path<(String, String)>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    if !session.remove_from_cart(&line_id).await? {
        return Err(line_not_found(&line_id));
    }
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/storefront/{session_id}/cart",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    responses((status = 200, description = "Session with an empty cart", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    session.clear_cart().await?;
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/storefront/{session_id}/compare",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    responses((status = 200, description = "Compared products in selection order", body = ApiResponse<Vec<ProductDetail>>)),
    tag = "Storefront"
)]
pub async fn compared_products(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<ProductDetail>> {
    let session = open(&state, &session_id).await?;
    let mut products = Vec::with_capacity(session.comparator().product_ids().len());
    for id in session.comparator().product_ids() {
        match state.services.products.get(*id).await {
            Ok(detail) => products.push(detail),
            // Deleted since it was picked
            Err(ServiceError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Json(ApiResponse::success(products)))
}

/// Adds the product to the comparison, or removes it when already there
#[utoipa::path(
    post,
    path = "/api/v1/storefront/{session_id}/compare/{product_id}",
    params(
        ("session_id" = String, Path, description = "Client-generated session id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Updated session", body = ApiResponse<SessionView>),
        (status = 409, description = "Already comparing the maximum number of products", body = crate::errors::ErrorResponse),
    ),
    tag = "Storefront"
)]
pub async fn toggle_compare(
    State(state): State<AppState>,
    Path((session_id, product_id)): Path<(String, Uuid)>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    if session.toggle_compare(product_id).await? == CompareOutcome::Full {
        return Err(ServiceError::Conflict(format!(
            "at most {} products can be compared",
            crate::storefront::MAX_COMPARED
        )));
    }
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/storefront/{session_id}/compare",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    responses((status = 200, description = "Updated session", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn clear_comparator(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    session.clear_comparator().await?;
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ViewModeUpdate {
    pub mode: ViewMode,
}

#[utoipa::path(
    put,
    path = "/api/v1/storefront/{session_id}/view-mode",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    request_body = ViewModeUpdate,
    responses((status = 200, description = "Updated session", body = ApiResponse<SessionView>)),
    tag = "Storefront"
)]
pub async fn set_view_mode(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<ViewModeUpdate>,
) -> ApiResult<SessionView> {
    let mut session = open(&state, &session_id).await?;
    session.set_view_mode(update.mode).await?;
    Ok(Json(ApiResponse::success(view(&state, &session).await?)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartCheckout {
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// Places the session cart as an order and empties the cart
#[utoipa::path(
    post,
    path = "/api/v1/storefront/{session_id}/checkout",
    params(("session_id" = String, Path, description = "Client-generated session id")),
    request_body = CartCheckout,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart or invalid contact data", body = crate::errors::ErrorResponse),
    ),
    tag = "Storefront"
)]
pub async fn checkout_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(contact): Json<CartCheckout>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    let mut session = open(&state, &session_id).await?;
    let request = CheckoutRequest {
        customer_id: contact.customer_id.or(session.state().customer_id),
        customer_name: contact.customer_name,
        customer_phone: contact.customer_phone,
        customer_email: contact.customer_email,
        delivery_address: contact.delivery_address,
        notes: contact.notes,
        items: checkout_lines(session.cart()),
    };

    let response = state.services.orders.checkout(request).await?;
    session.clear_cart().await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}
