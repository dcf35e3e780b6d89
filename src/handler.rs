//! HTTP request handlers
//!
//! Handlers are thin: they pull what they need out of the request, call into
//! the storage modules and map the result through [`crate::serializer`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use validator::Validate;

use crate::database::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::RequestContext;
use crate::model::{
    AddCartItemRequest, CheckoutRequest, LoginRequest, OrderContact, RegisterRequest,
    RemoveCartItemRequest, UpdateQuantityRequest,
};
use crate::{account, cart, catalog, order, serializer};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Runs CPU-heavy work (Argon2) off the async worker threads
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Task(e.to_string()))?
}

/// Creates an account
///
/// # Request Body
///
/// ```json
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "correct horse",
///   "confirm_password": "correct horse",
///   "first_name": "Alice",
///   "last_name": "Liddell",
///   "phone_number": "0812345678"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - account stored
/// - **400 Bad Request** - invalid form, password mismatch, or username/email taken
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let db = state.db.clone();
    blocking(move || account::register(&db, payload)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

/// Exchanges a username and password for a bearer token
///
/// # Response
///
/// - **200 OK** - `{"token": "...", "user": {...}}`
/// - **401 Unauthorized** - unknown user or wrong password
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let db = state.db.clone();
    let LoginRequest { username, password } = payload;
    let attempted = username.clone();
    let user = blocking(move || account::authenticate(&db, &username, &password))
        .await
        .inspect_err(|_| tracing::warn!(username = %attempted, "failed login"))?;
    let token = state.keys.issue(&user)?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(json!({
        "token": token,
        "user": serializer::login_user(&user),
    })))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<impl IntoResponse> {
    let caller = ctx.require_user()?;
    let user = account::get_user(&state.db, caller.id)?;
    let wishlist = account::wishlist(&state.db, user.id)?;
    Ok(Json(serializer::profile(&user, &wishlist)))
}

/// Public summary of a user, looked up by username
pub async fn user_info(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user = account::find_by_username(&state.db, &username)?;
    let wishlist = account::wishlist(&state.db, user.id)?;
    Ok(Json(serializer::user_info(&user, &wishlist)))
}

// ---------------------------------------------------------------------------
// Wishlist
// ---------------------------------------------------------------------------

pub async fn wishlist(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<impl IntoResponse> {
    let user = account::get_user(&state.db, ctx.require_user()?.id)?;
    let products = account::wishlist(&state.db, user.id)?;
    Ok(Json(json!({
        "wishlist": products.iter().map(serializer::wishlist_entry).collect::<Vec<_>>(),
    })))
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(product_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user = account::get_user(&state.db, ctx.require_user()?.id)?;
    account::add_to_wishlist(&state.db, user.id, &product_id)?;
    Ok(Json(json!({ "message": "Product added to wishlist" })))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(product_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user = account::get_user(&state.db, ctx.require_user()?.id)?;
    account::remove_from_wishlist(&state.db, user.id, &product_id)?;
    Ok(Json(json!({ "message": "Product removed from wishlist" })))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub async fn list_products(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let products = catalog::list_products(&state.db)?;
    Ok(Json(json!({
        "data": products.iter().map(serializer::product).collect::<Vec<_>>(),
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let product = catalog::get_product(&state.db, &product_id)?;
    Ok(Json(json!({ "data": serializer::product(&product) })))
}

/// Dashboard counters
pub async fn summarize(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = catalog::summarize(&state.db)?;
    Ok(Json(serializer::summary(&summary)))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Places an order from the submitted items
///
/// Guests may check out; a bearer token, when present, makes the caller the
/// order's owner.
///
/// # Request Body
///
/// ```json
/// {
///   "first_name": "Alice",
///   "address": "1 Main Road",
///   "shipping_method": "fd",
///   "payment_method": "cod",
///   "items": [{"product_id": "P1", "quantity": 2}]
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - the stored order
/// - **400 Bad Request** - no items, incomplete item, or not enough stock
/// - **404 Not Found** - an item references an unknown product
pub async fn checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(payload): AppJson<CheckoutRequest>,
) -> AppResult<impl IntoResponse> {
    let detail = order::checkout(&state.db, ctx.user.as_ref(), payload)?;
    Ok((StatusCode::CREATED, Json(serializer::order(&detail))))
}

/// Same as [`checkout`] but only for logged-in callers
pub async fn create_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(payload): AppJson<CheckoutRequest>,
) -> AppResult<impl IntoResponse> {
    let caller = ctx.require_user()?;
    let detail = order::checkout(&state.db, Some(caller), payload)?;
    Ok((StatusCode::CREATED, Json(serializer::order(&detail))))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<impl IntoResponse> {
    let caller = ctx.require_user()?;
    let orders = order::list_orders(&state.db, caller.id)?;
    Ok(Json(json!({
        "data": orders.iter().map(serializer::order).collect::<Vec<_>>(),
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(order_id): Path<u64>,
) -> AppResult<impl IntoResponse> {
    let caller = ctx.require_user()?;
    let detail = order::get_order(&state.db, caller.id, order_id)?;
    Ok(Json(serializer::order(&detail)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(order_id): Path<u64>,
) -> AppResult<impl IntoResponse> {
    let caller = ctx.require_user()?;
    let detail = order::cancel_order(&state.db, caller.id, order_id)?;
    Ok(Json(serializer::order(&detail)))
}

/// Order lines that reference a product
pub async fn orders_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let items = order::items_for_product(&state.db, &product_id)?;
    Ok(Json(json!({
        "data": items.iter().map(serializer::order_item).collect::<Vec<_>>(),
    })))
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

pub async fn current_cart(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<impl IntoResponse> {
    let detail = cart::current_cart(&state.db, &ctx.cart_owner())?;
    Ok(Json(serializer::cart(&detail)))
}

/// Adds a product to the caller's cart
///
/// # Request Body
///
/// ```json
/// {"product_id": "P1", "quantity": 2}
/// ```
pub async fn add_cart_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(payload): AppJson<AddCartItemRequest>,
) -> AppResult<impl IntoResponse> {
    let product_id = payload
        .product_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("product_id is required"))?;
    let detail = cart::add_item(&state.db, &ctx.cart_owner(), &product_id, payload.quantity)?;
    Ok(Json(serializer::cart(&detail)))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(payload): AppJson<RemoveCartItemRequest>,
) -> AppResult<impl IntoResponse> {
    let item_id = payload
        .item_id
        .ok_or_else(|| AppError::validation("item_id is required"))?;
    let detail = cart::remove_item(&state.db, &ctx.cart_owner(), item_id)?;
    Ok(Json(serializer::cart(&detail)))
}

pub async fn update_cart_quantity(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(payload): AppJson<UpdateQuantityRequest>,
) -> AppResult<impl IntoResponse> {
    let item_id = payload
        .item_id
        .ok_or_else(|| AppError::validation("item_id is required"))?;
    let detail = cart::update_quantity(&state.db, &ctx.cart_owner(), item_id, payload.quantity)?;
    Ok(Json(serializer::cart(&detail)))
}

/// Checks out the caller's current cart with the given contact details
pub async fn checkout_cart(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(contact): AppJson<OrderContact>,
) -> AppResult<impl IntoResponse> {
    let detail = order::checkout_cart(&state.db, &ctx.cart_owner(), ctx.user.as_ref(), contact)?;
    Ok((StatusCode::CREATED, Json(serializer::order(&detail))))
}
