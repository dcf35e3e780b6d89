//! Per-request context
//!
//! [`context_middleware`] reads the `Authorization` and `X-Cart-Token`
//! headers once and stores a [`RequestContext`] in the request extensions.
//! Handlers take it with `Extension<RequestContext>` instead of reaching
//! for any global state.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{bearer_token, AuthUser};
use crate::cart::CartOwner;
use crate::database::AppState;
use crate::error::{AppError, AuthError};

/// Header carrying a guest cart token
pub const CART_TOKEN_HEADER: &str = "x-cart-token";

/// What is known about the caller of the current request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Set when a valid bearer token was presented
    pub user: Option<AuthUser>,
    /// Guest cart token, if the client sent one
    pub cart_token: Option<String>,
}

impl RequestContext {
    /// The authenticated caller, or a missing-token error
    pub fn require_user(&self) -> Result<&AuthUser, AuthError> {
        self.user.as_ref().ok_or(AuthError::MissingToken)
    }

    /// Cart owner for this caller: the user when logged in, otherwise the guest token
    pub fn cart_owner(&self) -> CartOwner {
        match &self.user {
            Some(user) => CartOwner::User(user.id),
            None => CartOwner::Guest(self.cart_token.clone()),
        }
    }
}

/// Builds the [`RequestContext`] for the routes it wraps
///
/// A missing or empty bearer token leaves the caller anonymous. A token that
/// is present but expired or malformed rejects the request with 401.
pub async fn context_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match headers.get(AUTHORIZATION) {
        Some(value) => {
            let raw = value.to_str().map_err(|_| AuthError::InvalidToken)?;
            match bearer_token(raw)? {
                Some(token) => {
                    let claims = state.keys.verify(token).inspect_err(|err| {
                        tracing::debug!(error = %err, "rejected bearer token");
                    })?;
                    Some(AuthUser::from(claims))
                }
                None => None,
            }
        }
        None => None,
    };

    let cart_token = headers
        .get(CART_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    request
        .extensions_mut()
        .insert(RequestContext { user, cart_token });

    Ok(next.run(request).await)
}
