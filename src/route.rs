//! Route definitions for the storefront API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::normalize_path::NormalizePath;

use crate::database::AppState;
use crate::handler::{
    add_cart_item, add_to_wishlist, cancel_order, checkout, checkout_cart, create_order,
    current_cart, get_order, get_product, list_orders, list_products, login, orders_by_product,
    profile, register, remove_cart_item, remove_from_wishlist, summarize, update_cart_quantity,
    user_info, wishlist,
};
use crate::middleware::context_middleware;

/// Creates and configures the application router
///
/// # Route Definitions
///
/// Public:
/// - `POST /api/register`, `POST /api/login`
/// - `GET /api/userinfo/{username}`
/// - `GET /api/product/all`, `GET /api/product/byId/{product_id}`
/// - `GET /api/summarize`
/// - `GET /api/order/byProductId/{product_id}`
///
/// Behind [`context_middleware`] (bearer token optional, rejected when bad):
/// - `GET /api/profile`
/// - `GET|POST /api/orders`, `POST /api/orders/checkout`
/// - `GET /api/orders/{id}`, `POST /api/orders/{id}/cancel`
/// - `GET /api/wishlist`, `POST /api/wishlist/add/{id}`, `POST /api/wishlist/remove/{id}`
/// - `GET /api/carts/current`, `POST /api/carts/{add_item,remove_item,update_quantity,checkout}`
///
/// # Example Usage
///
/// ```no_run
/// # use chrono::Duration;
/// # use ecommerce::auth::TokenKeys;
/// # use ecommerce::database::{init_db, AppState};
/// # use ecommerce::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let state = AppState::new(db, TokenKeys::new("secret", Duration::hours(24)));
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/userinfo/{username}", get(user_info))
        .route("/product/all", get(list_products))
        .route("/product/byId/{product_id}", get(get_product))
        .route("/summarize", get(summarize))
        .route("/order/byProductId/{product_id}", get(orders_by_product));

    let caller_routes = Router::new()
        .route("/profile", get(profile))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/checkout", post(checkout))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/cancel", post(cancel_order))
        .route("/wishlist", get(wishlist))
        .route("/wishlist/add/{product_id}", post(add_to_wishlist))
        .route("/wishlist/remove/{product_id}", post(remove_from_wishlist))
        .route("/carts/current", get(current_cart))
        .route("/carts/add_item", post(add_cart_item))
        .route("/carts/remove_item", post(remove_cart_item))
        .route("/carts/update_quantity", post(update_cart_quantity))
        .route("/carts/checkout", post(checkout_cart))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware));

    Router::new()
        .nest("/api", public_routes.merge(caller_routes))
        .with_state(state)
}

/// Wraps the finished router so `/api/login/` reaches the `/api/login` route
///
/// Path normalization has to run before routing, so this wraps the router
/// instead of being added with [`Router::layer`].
pub fn trim_trailing_slash(app: Router) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(app)
}
